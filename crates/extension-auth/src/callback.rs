//! Redirect URL parsing

use url::Url;

use crate::error::{Error, Result};

/// Query parameters the provider sends back on the redirect. Empty values
/// are treated as absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub fn parse_redirect(response_url: &str) -> Result<RedirectParams> {
    let url = Url::parse(response_url).map_err(|e| Error::InvalidRedirect(e.to_string()))?;

    let mut params = RedirectParams::default();
    for (name, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        let slot = match &*name {
            "code" => &mut params.code,
            "state" => &mut params.state,
            "error" => &mut params.error,
            "error_description" => &mut params.error_description,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code() {
        let params = parse_redirect("https://x/redirect?code=ABC123").unwrap();
        assert_eq!(params.code.as_deref(), Some("ABC123"));
        assert!(params.error.is_none());
    }

    #[test]
    fn extracts_error_and_description() {
        let params = parse_redirect(
            "https://x/redirect?error=access_denied&error_description=The+user+cancelled",
        )
        .unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(
            params.error_description.as_deref(),
            Some("The user cancelled")
        );
        assert!(params.code.is_none());
    }

    #[test]
    fn decodes_percent_encoded_code_and_state() {
        let params =
            parse_redirect("https://x/redirect?code=0.AX%2Fabc&state=deadbeef&session_state=s")
                .unwrap();
        assert_eq!(params.code.as_deref(), Some("0.AX/abc"));
        assert_eq!(params.state.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn empty_values_count_as_absent() {
        let params = parse_redirect("https://x/redirect?code=&error=").unwrap();
        assert_eq!(params, RedirectParams::default());
    }

    #[test]
    fn unparsable_url_is_rejected() {
        assert!(matches!(
            parse_redirect("::not a url::"),
            Err(Error::InvalidRedirect(_))
        ));
    }
}
