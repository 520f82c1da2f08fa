//! Server-rendered pages.

use axum::response::Html;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use drivegallery_common::{FolderEntry, ImagePage};

/// Title of the landing page.
pub const GALLERY_TITLE: &str = "Welcome to My Google Drive Gallery";

/// Escape text for HTML element and attribute content.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Encode a single path segment.
fn segment(id: &str) -> String {
    utf8_percent_encode(id, NON_ALPHANUMERIC).to_string()
}

/// Gallery route for one folder, with the id encoded as a single segment.
pub fn folder_files_path(folder_id: &str) -> String {
    format!("/files/{}", segment(folder_id))
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<link rel=\"stylesheet\" href=\"/style.css\">\n</head>\n\
         <body>\n{body}\n</body>\n</html>\n",
        title = escape(title),
        body = body,
    ))
}

/// Landing page linking to the gallery or to the consent route.
pub fn landing(is_authorized: bool) -> Html<String> {
    let (url, label) = if is_authorized {
        ("/files", "View your images")
    } else {
        ("/auth", "Sign in with Google")
    };

    let body = format!(
        "<h1>{}</h1>\n<p><a href=\"{}\">{}</a></p>\n<p><a href=\"/folders\">Browse folders</a></p>",
        escape(GALLERY_TITLE),
        url,
        label
    );

    layout(GALLERY_TITLE, &body)
}

/// Folder list, each linking to its images.
pub fn folders(folders: &[FolderEntry]) -> Html<String> {
    let body = if folders.is_empty() {
        "<h1>Folders</h1>\n<p>No folders found.</p>".to_string()
    } else {
        let items: String = folders
            .iter()
            .map(|folder| {
                format!(
                    "<li><a href=\"{}\">{}</a></li>\n",
                    folder_files_path(&folder.id),
                    escape(&folder.name)
                )
            })
            .collect();
        format!("<h1>Folders</h1>\n<ul class=\"folders\">\n{}</ul>", items)
    };

    layout("Folders", &body)
}

/// One page of images. `base_path` is the route the next-page link targets.
pub fn gallery(heading: &str, page: &ImagePage, base_path: &str) -> Html<String> {
    let mut body = format!("<h1>{}</h1>\n", escape(heading));

    if page.is_empty() {
        body.push_str("<p>No files found.</p>\n");
    } else {
        body.push_str("<div class=\"gallery\">\n");
        for file in &page.files {
            let name = escape(&file.name);
            body.push_str(&format!(
                "<figure><img src=\"/images/{}\" alt=\"{}\" loading=\"lazy\"><figcaption>{}</figcaption></figure>\n",
                segment(&file.id),
                name,
                name
            ));
        }
        body.push_str("</div>\n");
    }

    if let Some(token) = &page.next_page_token {
        let token: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
        body.push_str(&format!(
            "<p><a rel=\"next\" href=\"{}?pageToken={}\">Next page</a></p>\n",
            escape(base_path),
            token
        ));
    }

    body.push_str("<p><a href=\"/folders\">Back to folders</a></p>");

    layout(heading, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivegallery_common::FileEntry;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<b>\"Tom & Jerry's\"</b>"),
            "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_landing_links() {
        assert!(landing(true).0.contains("href=\"/files\""));
        assert!(landing(false).0.contains("href=\"/auth\""));
        assert!(landing(false).0.contains(GALLERY_TITLE));
    }

    #[test]
    fn test_empty_folders_message() {
        assert!(folders(&[]).0.contains("No folders found."));
    }

    #[test]
    fn test_folder_links_are_encoded() {
        let html = folders(&[FolderEntry {
            id: "a/b".to_string(),
            name: "<Trips>".to_string(),
        }])
        .0;

        assert!(html.contains("href=\"/files/a%2Fb\""));
        assert!(html.contains("&lt;Trips&gt;"));
    }

    #[test]
    fn test_gallery_empty_message() {
        let html = gallery("Images", &ImagePage::default(), "/files").0;
        assert!(html.contains("No files found."));
        assert!(!html.contains("rel=\"next\""));
    }

    #[test]
    fn test_gallery_next_page_link() {
        let page = ImagePage {
            files: vec![FileEntry {
                id: "i1".to_string(),
                name: "beach.jpg".to_string(),
            }],
            next_page_token: Some("tok en/+".to_string()),
        };

        let html = gallery("Images", &page, "/files/f1").0;
        assert!(html.contains("src=\"/images/i1\""));
        assert!(html.contains("href=\"/files/f1?pageToken=tok+en%2F%2B\""));
    }

    #[test]
    fn test_next_page_link_keeps_folder_id_in_path() {
        let page = ImagePage {
            files: Vec::new(),
            next_page_token: Some("t".to_string()),
        };

        let base = folder_files_path("a?b#c/d");
        assert_eq!(base, "/files/a%3Fb%23c%2Fd");

        let html = gallery("Images", &page, &base).0;
        assert!(html.contains("href=\"/files/a%3Fb%23c%2Fd?pageToken=t\""));
    }
}
