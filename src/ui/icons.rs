pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const PERSON: &str = "👤";
    pub const POST: &str = "📝";
    pub const REPLY: &str = "💬";
    pub const LIKE: &str = "❤️";
    pub const DIRECT: &str = "📨";
    pub const NEW: &str = "✨";
    pub const MAG: &str = "🔎";
}
