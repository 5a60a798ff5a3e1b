//! Delivery channels and the lightweight-markup to HTML conversion.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;

pub use telegram::TelegramChannel;

/// Where finished posts go. Implementations own their retry budget; an `Err`
/// means every attempt failed.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Deliver already converted HTML.
    async fn send(&self, html: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// `**bold**`, `*italic*` and `[text](url)` to Telegram HTML. Bare `& < >`
/// in the text are escaped first so they cannot break the markup.
pub fn markdown_to_html(text: &str) -> String {
    static RE_BOLD: OnceCell<Regex> = OnceCell::new();
    static RE_ITALIC: OnceCell<Regex> = OnceCell::new();
    static RE_LINK: OnceCell<Regex> = OnceCell::new();

    let escaped = html_escape::encode_text(text);

    let bold = RE_BOLD.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold regex"));
    let out = bold.replace_all(&escaped, "<b>$1</b>");

    // Only single asterisks remain after the bold pass.
    let italic = RE_ITALIC.get_or_init(|| Regex::new(r"\*([^*\n]+?)\*").expect("italic regex"));
    let out = italic.replace_all(&out, "<i>$1</i>");

    let link = RE_LINK
        .get_or_init(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").expect("link regex"));
    link.replace_all(&out, r#"<a href="$2">$1</a>"#).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_bold_italic_and_links() {
        let md = "🎮 **Axie sobe 20%.** Veja *agora* em [Decrypt](https://decrypt.co/1)";
        assert_eq!(
            markdown_to_html(md),
            "🎮 <b>Axie sobe 20%.</b> Veja <i>agora</i> em <a href=\"https://decrypt.co/1\">Decrypt</a>"
        );
    }

    #[test]
    fn escapes_raw_html_characters() {
        assert_eq!(markdown_to_html("P&D < 5 **ok**"), "P&amp;D &lt; 5 <b>ok</b>");
    }
}
