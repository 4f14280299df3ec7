//! Per-provider page knowledge: URLs and CSS selectors.
//!
//! These selectors track the live ChatGPT and Claude web apps and are the
//! part of the system most likely to rot. They are kept in one place so a
//! UI change is a one-file fix.

use courier_types::Provider;

/// Everything the session needs to know to drive one provider's chat page.
#[derive(Debug, Clone, Copy)]
pub struct ProviderProfile {
    pub provider: Provider,
    /// Where a fresh conversation lives.
    pub chat_url: &'static str,
    /// Input controls, in preference order.
    pub input_selectors: &'static [&'static str],
    /// Send buttons, in preference order. Enter is the fallback.
    pub send_selectors: &'static [&'static str],
    /// Assistant reply containers.
    pub reply_selector: &'static str,
    /// Looser reply fallback, when the primary matches nothing.
    pub reply_fallback: Option<&'static str>,
    /// Visible only while the model is still generating.
    pub busy_selector: &'static str,
}

const CHATGPT: ProviderProfile = ProviderProfile {
    provider: Provider::ChatGpt,
    chat_url: "https://chatgpt.com/",
    input_selectors: &[
        r#"div[contenteditable="true"]#prompt-textarea"#,
        "textarea",
        r#"div[contenteditable="true"]"#,
    ],
    send_selectors: &[
        r#"button[data-testid="send-button"]"#,
        r#"button[aria-label="Send prompt"]"#,
    ],
    reply_selector: r#"div[data-message-author-role="assistant"]"#,
    reply_fallback: None,
    busy_selector: r#"button[aria-label="Stop generating"]"#,
};

const CLAUDE: ProviderProfile = ProviderProfile {
    provider: Provider::Claude,
    chat_url: "https://claude.ai/new",
    input_selectors: &[r#"div[contenteditable="true"]"#],
    send_selectors: &[r#"button[aria-label="Send Message"]"#],
    reply_selector: r#"div[data-testid="assistant-message"]"#,
    reply_fallback: Some(".prose"),
    busy_selector: r#"button[aria-label="Stop response"]"#,
};

/// The static profile for a provider.
pub fn profile(provider: Provider) -> &'static ProviderProfile {
    match provider {
        Provider::ChatGpt => &CHATGPT,
        Provider::Claude => &CLAUDE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_self_consistent() {
        for provider in Provider::ALL {
            let p = profile(provider);
            assert_eq!(p.provider, provider);
            assert!(p.chat_url.starts_with("https://"));
            assert!(!p.input_selectors.is_empty());
            assert!(!p.send_selectors.is_empty());
            assert!(!p.reply_selector.is_empty());
            assert!(!p.busy_selector.is_empty());
        }
    }

    #[test]
    fn chatgpt_prefers_prompt_textarea() {
        let p = profile(Provider::ChatGpt);
        assert!(p.input_selectors[0].contains("prompt-textarea"));
        assert!(p.reply_selector.contains("assistant"));
        assert!(p.reply_fallback.is_none());
    }

    #[test]
    fn claude_has_prose_fallback() {
        let p = profile(Provider::Claude);
        assert_eq!(p.reply_fallback, Some(".prose"));
        assert!(p.chat_url.ends_with("/new"));
    }
}
