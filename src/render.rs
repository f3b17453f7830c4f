//! HTML rendering of directory listings.

use crate::fs::DirectoryEntry;

/// Everything about the current request the listing page needs.
#[derive(Debug, Clone, Copy)]
pub struct ListingPage<'a> {
    /// `http` or `https`
    pub scheme: &'a str,
    /// Value of the request's Host header
    pub host: &'a str,
    /// Decoded URL path of the listed directory
    pub request_path: &'a str,
    /// Also list dot-prefixed entries
    pub show_hidden: bool,
}

impl ListingPage<'_> {
    fn url(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, encode_path(path))
    }
}

/// Render the listing page with its upload/new dir/remove form.
pub fn render_listing(page: &ListingPage<'_>, entries: &[DirectoryEntry]) -> String {
    let visible: Vec<&DirectoryEntry> = entries
        .iter()
        .filter(|entry| page.show_hidden || !entry.is_hidden())
        .collect();

    let title = html_escape(&format!("Directory Listing for {}", display_path(page.request_path)));
    let current_url = page.url(page.request_path);
    let separator = if page.request_path.ends_with('/') { "" } else { "/" };

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{title}</title>\n</head>\n<body>\n"));
    html.push_str(&format!("<h3>{title}</h3>\n<hr>\n<ul>\n"));

    for entry in &visible {
        let mut href = format!(
            "{}{}{}",
            current_url,
            separator,
            urlencoding::encode(&entry.name)
        );
        let mut label = html_escape(&entry.name);
        if entry.is_dir() {
            href.push('/');
            label.push('/');
        }
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            html_escape(&href),
            label
        ));
    }
    html.push_str("</ul>\n");

    if let Some(parent) = parent_path(page.request_path) {
        html.push_str(&format!(
            "<a href=\"{}\">Parent directory</a>\n",
            html_escape(&page.url(&parent))
        ));
    }

    html.push_str("<hr>\n");
    html.push_str(&format!(
        "<form enctype=\"multipart/form-data\" action=\"{}\" method=\"post\">\n<table>\n",
        html_escape(&current_url)
    ));
    html.push_str(
        "<tr><td><input type=\"file\" name=\"uploadfile\"></td>\
         <td><input type=\"submit\" value=\"upload\"></td></tr>\n",
    );
    html.push_str(
        "<tr><td><input type=\"text\" name=\"newdir\"></td>\
         <td><input type=\"submit\" value=\"new dir\"></td></tr>\n",
    );
    html.push_str("<tr><td><select name=\"filelist\">\n<option value=\"\"></option>\n");
    for entry in &visible {
        let name = html_escape(&entry.name);
        let suffix = if entry.is_dir() { "/" } else { "" };
        html.push_str(&format!(
            "<option value=\"{name}\">{name}{suffix}</option>\n"
        ));
    }
    html.push_str(
        "</select></td><td><input type=\"submit\" value=\"remove\"></td></tr>\n\
         </table>\n</form>\n</body>\n</html>\n",
    );

    html
}

/// Link target for the directory above `request_path`, None at the root.
pub fn parent_path(request_path: &str) -> Option<String> {
    let trimmed = request_path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let cut = trimmed.rfind('/').unwrap_or(0);
    let parent = trimmed[..cut].trim_end_matches('/');
    if parent.is_empty() {
        Some("/".to_string())
    } else {
        Some(parent.to_string())
    }
}

fn display_path(request_path: &str) -> String {
    let trimmed = request_path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("{trimmed}/")
    }
}

/// Percent-encode each segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Escape HTML entities
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
