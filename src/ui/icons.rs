//! Shared UI icons.
//!
//! Emoji with plain-text fallbacks for terminals that can't render them.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Phase indicators
pub static PENDING: Emoji<'_, '_> = Emoji("⏳ ", "[..]");
pub static READY: Emoji<'_, '_> = Emoji("🟢 ", "[RDY]");
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R]");
pub static BLOCKER: Emoji<'_, '_> = Emoji("🚧 ", "[BLOCK]");
pub static PIVOT: Emoji<'_, '_> = Emoji("🔄 ", "[REV]");

// Plan and history
pub static WAVE: Emoji<'_, '_> = Emoji("🌊 ", "[W]");
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[PROG]");
pub static CHECKPOINT: Emoji<'_, '_> = Emoji("📍 ", "[CP]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
