use crate::ui::{theme, Icons};
use crate::{Post, PostReply};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// Print one post line: icon, owner, optional recipient, time, text
pub fn post_line(post: &Post, likes: usize, known: bool) {
    let icon = if post.recipient.is_some() { Icons::DIRECT } else { Icons::POST };
    let marker = if known { "" } else { Icons::NEW };
    let recipient = post
        .recipient
        .as_ref()
        .map(|r| format!(" → {}", r))
        .unwrap_or_default();
    println!(
        "{} {}{} {} {} {}",
        icon,
        post.owner.as_str().style(theme().info.clone()),
        recipient,
        muted(&format!("@{}", post.time)),
        post.text,
        marker
    );
    println!("   {} {}  {} {}", dim("id"), post.id, Icons::LIKE, likes);
}

/// Print one indented reply line
pub fn reply_line(reply: &PostReply, likes: usize, known: bool) {
    let marker = if known { "" } else { Icons::NEW };
    println!(
        "   {} {} {} {} {}",
        Icons::REPLY,
        reply.owner.as_str().style(theme().info.clone()),
        muted(&format!("@{}", reply.time)),
        reply.text,
        marker
    );
    println!("      {} {}  {} {}", dim("id"), reply.id, Icons::LIKE, likes);
}
