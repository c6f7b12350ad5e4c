use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scraper::{Html, Selector};
use url::Url;

/// A candidate post parsed out of a rendered feed fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPost {
    pub source_url: String,
    pub text: String,
    pub posted_at: DateTime<Utc>,
}

/// Parse a rendered activity-feed fragment into candidate posts.
///
/// Each `<article>` must carry a `<time datetime=...>` stamp, a permalink
/// anchor into the feed (`a[href*="/feed/update"]`, resolved against
/// `base_url` with the query string stripped), and non-empty text. Articles
/// missing any of these are dropped without comment, since partial feed
/// markup is expected rather than exceptional. Never fails on malformed input.
pub fn extract_posts(html: &str, base_url: &str) -> Vec<ExtractedPost> {
    let document = Html::parse_document(html);
    let article_selector = Selector::parse("article").expect("valid selector");
    let time_selector = Selector::parse("time[datetime]").expect("valid selector");
    let link_selector = Selector::parse(r#"a[href*="/feed/update"]"#).expect("valid selector");
    let base = Url::parse(base_url).ok();

    let mut posts = Vec::new();

    for article in document.select(&article_selector) {
        let Some(stamp) = article
            .select(&time_selector)
            .next()
            .and_then(|t| t.value().attr("datetime"))
        else {
            continue;
        };
        let Some(posted_at) = parse_datetime_attr(stamp) else {
            continue;
        };

        let Some(href) = article
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let Some(source_url) = resolve_permalink(href, base.as_ref()) else {
            continue;
        };

        let text = article
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            continue;
        }

        posts.push(ExtractedPost {
            source_url,
            text,
            posted_at,
        });
    }

    posts
}

/// Parse a `datetime` attribute: RFC 3339, a bare local datetime, or a bare
/// date (feeds emit all three).
fn parse_datetime_attr(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Resolve a permalink href against the feed URL and strip the query string
/// and fragment; tracking parameters would defeat the dedup key.
fn resolve_permalink(href: &str, base: Option<&Url>) -> Option<String> {
    let mut resolved = if href.starts_with("http://") || href.starts_with("https://") {
        Url::parse(href).ok()?
    } else {
        base?.join(href).ok()?
    };

    resolved.set_query(None);
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.linkedin.com/in/ada/recent-activity/";

    fn article(datetime: &str, href: &str, body: &str) -> String {
        format!(
            r#"<article><time datetime="{datetime}"></time><a href="{href}">permalink</a><p>{body}</p></article>"#
        )
    }

    #[test]
    fn extracts_complete_articles() {
        let html = format!(
            "<html><body>{}{}</body></html>",
            article(
                "2024-03-01T12:00:00Z",
                "/feed/update/urn:li:activity:1?utm_source=share",
                "Shipping the new release today."
            ),
            article(
                "2024-02-15T09:30:00Z",
                "https://www.linkedin.com/feed/update/urn:li:activity:2",
                "We are   hiring!"
            ),
        );

        let posts = extract_posts(&html, BASE);
        assert_eq!(posts.len(), 2);

        assert_eq!(
            posts[0].source_url,
            "https://www.linkedin.com/feed/update/urn:li:activity:1"
        );
        assert!(posts[0].text.contains("Shipping the new release"));
        assert_eq!(
            posts[0].posted_at,
            DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z").unwrap()
        );

        // Whitespace is collapsed
        assert!(posts[1].text.contains("We are hiring!"));
    }

    #[test]
    fn drops_articles_missing_required_fields() {
        let html = format!(
            "<html><body>\
             <article><a href=\"/feed/update/1\">no time</a><p>text</p></article>\
             <article><time datetime=\"2024-03-01\"></time><p>no permalink</p></article>\
             <article><time datetime=\"not-a-date\"></time><a href=\"/feed/update/2\">x</a><p>bad stamp</p></article>\
             {}\
             </body></html>",
            article("2024-03-01", "/feed/update/urn:li:activity:3", "kept"),
        );

        let posts = extract_posts(&html, BASE);
        assert_eq!(posts.len(), 1);
        assert!(posts[0].text.contains("kept"));
    }

    #[test]
    fn drops_article_with_empty_text() {
        let html = r#"<article><time datetime="2024-03-01"></time><a href="/feed/update/1"></a></article>"#;
        // The permalink anchor itself is the only text source and it is empty.
        assert!(extract_posts(html, BASE).is_empty());
    }

    #[test]
    fn date_only_stamp_parses_to_midnight_utc() {
        let html = article("2024-03-01", "/feed/update/1", "dated post");
        let posts = extract_posts(&html, BASE);
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].posted_at,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc()
        );
    }

    #[test]
    fn empty_and_malformed_input() {
        assert!(extract_posts("", BASE).is_empty());
        assert!(extract_posts("<div>not a feed</div>", BASE).is_empty());
        assert!(extract_posts("<article><article><time", BASE).is_empty());
    }
}
