use std::env;
use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use arboard::Clipboard;
use base64::{engine::general_purpose, Engine as _};

/// How a share request ended. Every request ends in one of these; there is
/// no silent failure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    /// The system clipboard took the link.
    CopiedSystem,
    /// The terminal took the link via an OSC 52 escape.
    CopiedTerminal,
    /// Neither clipboard worked; the caller shows the link for hand copying.
    Manual,
}

impl ShareOutcome {
    pub fn copied(&self) -> bool {
        matches!(self, ShareOutcome::CopiedSystem | ShareOutcome::CopiedTerminal)
    }
}

/// Runs the share chain for a link: system clipboard, then the terminal's
/// OSC 52 escape, then manual display.
pub fn share_link(url: &str) -> ShareOutcome {
    share_link_with(url, copy_to_system_clipboard, copy_via_osc52)
}

fn share_link_with<S, T>(url: &str, system: S, terminal: T) -> ShareOutcome
where
    S: FnOnce(&str) -> Result<()>,
    T: FnOnce(&str) -> Result<()>,
{
    if system(url).is_ok() {
        return ShareOutcome::CopiedSystem;
    }
    if terminal(url).is_ok() {
        return ShareOutcome::CopiedTerminal;
    }
    ShareOutcome::Manual
}

pub fn copy_to_system_clipboard(text: &str) -> Result<()> {
    let mut clipboard =
        Clipboard::new().map_err(|err| anyhow!("create clipboard context: {}", err))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|err| anyhow!("copy link: {}", err))?;
    Ok(())
}

/// Asks the terminal emulator to take the text into its clipboard. Works
/// over SSH where no display server is reachable.
pub fn copy_via_osc52(text: &str) -> Result<()> {
    let sequence = osc52_sequence(text, tmux_passthrough_enabled());
    let mut out = io::stdout().lock();
    out.write_all(sequence.as_bytes())
        .context("write clipboard escape")?;
    out.flush().context("flush clipboard escape")?;
    Ok(())
}

fn tmux_passthrough_enabled() -> bool {
    env::var("TMUX").map(|v| !v.is_empty()).unwrap_or(false)
}

fn osc52_sequence(text: &str, wrap_tmux: bool) -> String {
    let encoded = general_purpose::STANDARD.encode(text.as_bytes());
    let mut out = String::new();
    if wrap_tmux {
        out.push_str("\x1bPtmux;\x1b");
    }
    out.push_str("\x1b]52;c;");
    out.push_str(&encoded);
    out.push('\x07');
    if wrap_tmux {
        out.push_str("\x1b\\");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_working_tier_wins() {
        let outcome = share_link_with("https://x/1", |_| Ok(()), |_| panic!("unreached"));
        assert_eq!(outcome, ShareOutcome::CopiedSystem);
        assert!(outcome.copied());

        let outcome = share_link_with("https://x/1", |_| Err(anyhow!("no display")), |_| Ok(()));
        assert_eq!(outcome, ShareOutcome::CopiedTerminal);
        assert!(outcome.copied());
    }

    #[test]
    fn exhausted_tiers_still_end_definitively() {
        let outcome = share_link_with(
            "https://x/1",
            |_| Err(anyhow!("no display")),
            |_| Err(anyhow!("stdout closed")),
        );
        assert_eq!(outcome, ShareOutcome::Manual);
        assert!(!outcome.copied());
    }

    #[test]
    fn osc52_wraps_the_payload() {
        let plain = osc52_sequence("https://memeverse.in/post?post_id=9", false);
        assert!(plain.starts_with("\x1b]52;c;"));
        assert!(plain.ends_with('\x07'));
        let encoded = &plain["\x1b]52;c;".len()..plain.len() - 1];
        assert_eq!(
            general_purpose::STANDARD.decode(encoded).unwrap(),
            b"https://memeverse.in/post?post_id=9"
        );

        let wrapped = osc52_sequence("x", true);
        assert!(wrapped.starts_with("\x1bPtmux;\x1b\x1b]52;c;"));
        assert!(wrapped.ends_with("\x07\x1b\\"));
    }
}
