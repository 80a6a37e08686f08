//! HTML pages shown in the login popup after the Microsoft redirect.

const BASE_STYLE: &str = "body { font-family: Arial, sans-serif; margin: 40px; background-color: #f5f5f5; }
            .container { background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }";

const SUCCESS_STYLE: &str = "body { font-family: Arial, sans-serif; margin: 40px; background-color: #e8f5e8; text-align: center; }
            .container { background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); max-width: 500px; margin: 0 auto; }
            .success { color: #2e7d32; font-size: 18px; margin-bottom: 20px; }
            .close-btn { background: #4caf50; color: white; padding: 12px 24px; border: none; border-radius: 4px; cursor: pointer; font-size: 16px; margin-top: 15px; }";

const AUTO_CLOSE: &str = "<script>
            setTimeout(function() { window.close(); }, 3000);
            function closeWindow() { window.close(); }
        </script>";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '\n' => out.push_str("<br>"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, style: &str, head_extra: &str, body: &str) -> String {
    format!(
        "<html>
    <head>
        <title>{title}</title>
        <style>
            {style}
        </style>
        {head_extra}
    </head>
    <body>
        <div class=\"container\">
{body}
        </div>
    </body>
</html>"
    )
}

/// Microsoft redirected back with `error`.
pub fn project_oauth_error(error: &str, description: Option<&str>) -> String {
    let mut details = format!("Microsoft OAuth Error: {error}");
    if let Some(desc) = description {
        details.push_str(&format!(" - {desc}"));
    }
    let desc = description.unwrap_or_default();
    if desc.contains("Single-Page Application") {
        details.push_str(
            "\n\nSPA Authentication Issue: This error occurs when there's a mismatch in client configuration or \
             request origin. The application is configured correctly for SPA with PKCE.",
        );
    } else if desc.contains("PKCE") {
        details.push_str(
            "\n\nPKCE (Proof Key for Code Exchange) Issue: Please try the following:\n1. Clear your browser \
             cache\n2. Try logging in again\n3. If the issue persists, check the application configuration.",
        );
    }

    let style = format!(
        "{BASE_STYLE}
            .error {{ color: #d32f2f; margin-bottom: 20px; background: #fff5f5; padding: 15px; border-radius: 4px; }}
            .retry-btn {{ background: #1976d2; color: white; padding: 10px 20px; text-decoration: none; border-radius: 4px; display: inline-block; margin-top: 15px; }}
            .spa-info {{ background: #e3f2fd; padding: 15px; border-radius: 4px; margin: 15px 0; border-left: 4px solid #1976d2; }}"
    );
    let body = format!(
        "            <h1>🔒 SPA Authentication Failed</h1>
            <div class=\"error\">{}</div>
            <div class=\"spa-info\">
                <strong>SPA Configuration:</strong> This application is configured as a Single-Page Application (SPA) with PKCE security.
                Make sure you're accessing from the correct origin (http://localhost:8001).
            </div>
            <p>You can try logging in again or close this window and return to the main application.</p>
            <a href=\"/project/login\" class=\"retry-btn\">Try Login Again</a>",
        escape(&details)
    );
    page("SPA Authentication Failed", &style, "", &body)
}

/// Redirect without an authorization code.
pub fn project_cancelled() -> String {
    page(
        "SPA Authentication Cancelled",
        BASE_STYLE,
        "",
        "            <h1>❌ SPA Authentication Cancelled</h1>
            <p>Authorization code not found. The login process may have been cancelled or interrupted.</p>
            <p>Please close this window and try logging in again from the main application.</p>
            <a href=\"/project/login\" style=\"background: #1976d2; color: white; padding: 10px 20px; text-decoration: none; border-radius: 4px;\">Try Again</a>",
    )
}

pub fn project_success() -> String {
    let style = format!(
        "{SUCCESS_STYLE}
            .spa-badge {{ background: #1976d2; color: white; padding: 5px 10px; border-radius: 12px; font-size: 12px; display: inline-block; margin: 10px 0; }}"
    );
    page(
        "SPA Login Successful",
        &style,
        AUTO_CLOSE,
        "            <h1>✅ SPA Login Successful!</h1>
            <div class=\"spa-badge\">Single-Page Application</div>
            <div class=\"success\">
                You have successfully logged in to Microsoft Project Management using SPA with PKCE security.
            </div>
            <p>You can now access project data and features securely.</p>
            <p><small>This window will close automatically in 3 seconds...</small></p>
            <button class=\"close-btn\" onclick=\"closeWindow()\">Close Window</button>",
    )
}

/// Explanation for a failed code exchange, keyed on the error text.
pub fn exchange_error_details(message: &str) -> String {
    if message.contains("Single-Page Application") {
        format!(
            "SPA Token Exchange Error: {message}\n\nThis occurs when the token request doesn't match SPA \
             configuration. Please ensure:\n1. The application is registered as SPA in Azure\n2. PKCE parameters \
             are correctly generated\n3. Origin header matches the registered redirect URI"
        )
    } else if message.contains("PKCE") || message.contains("code_verifier") {
        format!(
            "PKCE Verification Failed: {message}\n\nThis is likely due to a session mismatch in SPA flow. Please \
             try:\n1. Starting a fresh login process\n2. Clearing browser cache if the issue persists\n3. Ensure \
             cookies are enabled"
        )
    } else if message.contains("invalid_grant") {
        "Authorization Grant Invalid: The authorization code may have expired or already been used. Please try \
         logging in again."
            .into()
    } else if message.contains("invalid_client") {
        "Client Configuration Error: There may be an issue with the SPA application configuration. Please contact \
         support."
            .into()
    } else {
        format!("SPA Authentication Error: {message}")
    }
}

pub fn project_exchange_error(message: &str) -> String {
    let style = "body { font-family: Arial, sans-serif; margin: 40px; background-color: #ffeaa7; }
            .container { background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
            .error { color: #d63031; background: #fff5f5; padding: 15px; border-radius: 4px; margin: 15px 0; }
            .spa-note { background: #dbeafe; padding: 15px; border-radius: 4px; margin: 15px 0; border-left: 4px solid #3b82f6; }";
    let body = format!(
        "            <h1>⚠️ SPA Authentication Error</h1>
            <div class=\"error\">{}</div>
            <div class=\"spa-note\">
                <strong>Note:</strong> This application uses Single-Page Application (SPA) authentication with PKCE for enhanced security.
            </div>
            <p>Please try logging in again. If the problem persists, please contact support.</p>
            <a href=\"/project/login\" style=\"background: #0984e3; color: white; padding: 10px 20px; text-decoration: none; border-radius: 4px;\">Retry Login</a>",
        escape(&exchange_error_details(message))
    );
    page("SPA Authentication Error", style, "", &body)
}

pub fn todo_success() -> String {
    page(
        "Login Successful",
        SUCCESS_STYLE,
        AUTO_CLOSE,
        "            <h1>✅ Login Successful!</h1>
            <div class=\"success\">
                You have successfully logged in to Microsoft To-Do.
            </div>
            <p>You can now access your tasks and use the Smart To-Do Assistant.</p>
            <p><small>This window will close automatically in 3 seconds...</small></p>
            <button class=\"close-btn\" onclick=\"closeWindow()\">Close Window</button>",
    )
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("OAuth error (invalid_grant): code expired", "Authorization Grant Invalid")]
    #[case("OAuth error (invalid_client): bad secret", "Client Configuration Error")]
    #[case("missing code_verifier", "PKCE Verification Failed")]
    #[case("Tokens issued for the 'Single-Page Application' client-type", "SPA Token Exchange Error")]
    #[case("connection refused", "SPA Authentication Error: connection refused")]
    fn exchange_hints(#[case] message: &str, #[case] expected_start: &str) {
        assert!(exchange_error_details(message).starts_with(expected_start));
    }

    #[test]
    fn reflected_errors_are_escaped() {
        let html = project_oauth_error("access_denied", Some("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn pkce_hint_is_appended() {
        let html = project_oauth_error("invalid_request", Some("PKCE verification failed"));
        assert!(html.contains("PKCE (Proof Key for Code Exchange) Issue"));
    }
}
