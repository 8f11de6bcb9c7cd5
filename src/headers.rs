//! The browser header bundle sent with every keep-alive request.
//!
//! The values mirror a Chrome 136 top-level navigation into an iframe, which
//! is what the remote editor expects when a session is resumed.

pub const DEFAULT_ORIGIN: &str = "https://cloudstudio.net";

pub const COOKIE: &str = "Cookie";

const SEC_CH_UA: &str = r#""Chromium";v="136", "Google Chrome";v="136", "Not.A/Brand";v="99""#;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// Builds the ordered header list for `origin`, ending with the session cookie.
pub fn browser_headers(origin: &str, cookie: &str) -> Vec<(String, String)> {
    let origin = origin.trim_end_matches('/');
    let referer = format!("{origin}/");

    [
        ("content-length", "0"),
        ("cache-control", "max-age=0"),
        ("sec-ch-ua", SEC_CH_UA),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"Windows\""),
        ("origin", origin),
        ("content-type", "application/x-www-form-urlencoded"),
        ("upgrade-insecure-requests", "1"),
        ("user-agent", USER_AGENT),
        ("accept", ACCEPT),
        ("sec-fetch-site", "cross-site"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-dest", "iframe"),
        ("sec-fetch-storage-access", "active"),
        ("referer", referer.as_str()),
        ("accept-encoding", "gzip, deflate, br, zstd"),
        ("accept-language", "zh-CN,zh;q=0.9"),
        ("priority", "u=0, i"),
        (COOKIE, cookie),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_owned(), value.to_owned()))
    .collect()
}
