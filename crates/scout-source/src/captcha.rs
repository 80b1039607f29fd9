//! CAPTCHA detection in fetched page content.

/// Markers that identify a challenge page rather than directory results.
pub const CAPTCHA_MARKERS: [&str; 4] = ["g-recaptcha", "recaptcha", "hcaptcha", "captcha"];

/// Detect if a CAPTCHA is present in the page body (case-insensitive).
#[must_use]
pub fn contains_captcha(body: &str) -> bool {
    let lowered = body.to_lowercase();
    CAPTCHA_MARKERS.iter().any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_recaptcha_widget() {
        assert!(contains_captcha(r#"<div class="g-recaptcha" data-sitekey="x"></div>"#));
        assert!(contains_captcha("<script src=\"https://hcaptcha.com/1/api.js\"></script>"));
        assert!(contains_captcha("Please complete the CAPTCHA to continue"));
    }

    #[test]
    fn test_plain_results_page_is_not_a_challenge() {
        assert!(!contains_captcha("<table><tr><td>Jane Doe</td></tr></table>"));
        assert!(!contains_captcha(""));
    }
}
