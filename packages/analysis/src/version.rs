//! HTML version detection from the raw document text.

/// Identify the HTML version from the doctype declaration.
///
/// Pure string inspection of the raw content; never fails. Documents
/// without a recognizable doctype report `"Unknown"`.
pub fn detect_html_version(raw: &str) -> String {
    // The doctype, when present, lives in the first few bytes.
    let head: String = raw.chars().take(2048).collect::<String>().to_lowercase();

    let Some(start) = head.find("<!doctype") else {
        return "Unknown".to_string();
    };
    let decl = match head[start..].find('>') {
        Some(end) => &head[start..start + end],
        None => &head[start..],
    };

    if decl.contains("xhtml 1.1") {
        "XHTML 1.1".to_string()
    } else if decl.contains("xhtml 1.0") {
        "XHTML 1.0".to_string()
    } else if decl.contains("html 4.01") {
        "HTML 4.01".to_string()
    } else if decl.contains("html 3.2") {
        "HTML 3.2".to_string()
    } else {
        // A bare `<!DOCTYPE html>` is the HTML5 doctype.
        "HTML5".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html5_doctype() {
        assert_eq!(detect_html_version("<!DOCTYPE html><html></html>"), "HTML5");
    }

    #[test]
    fn html401_doctype() {
        let doc = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "http://www.w3.org/TR/html4/loose.dtd"><html></html>"#;
        assert_eq!(detect_html_version(doc), "HTML 4.01");
    }

    #[test]
    fn xhtml10_doctype() {
        let doc = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#;
        assert_eq!(detect_html_version(doc), "XHTML 1.0");
    }

    #[test]
    fn missing_doctype_is_unknown() {
        assert_eq!(detect_html_version("<html><body></body></html>"), "Unknown");
    }

    #[test]
    fn doctype_after_leading_whitespace() {
        assert_eq!(detect_html_version("\n  <!doctype html>\n<html>"), "HTML5");
    }
}
