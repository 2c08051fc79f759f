// src/core/scanner/fingerprint_scanner.rs

use tracing::{debug, info};
use crate::core::error::CollaboratorResult;
use crate::core::models::TechnologyFinding;
use crate::core::scanner::http_client::{WebFetcher, WebResponse};
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use regex::Regex;
use once_cell::sync::Lazy;

/// Where a rule looks for its signature.
enum Check<'a> {
    Header(&'a str, &'a Lazy<Regex>),
    MetaTag(&'a str, &'a Lazy<Regex>),
    Body(&'a Lazy<Regex>),
    /// `src` attribute of `<script>` tags.
    ScriptSrc(&'a Lazy<Regex>),
    /// `href` attribute of `<link>` tags.
    LinkHref(&'a Lazy<Regex>),
    /// All `set-cookie` values.
    Cookie(&'a Lazy<Regex>),
}

impl Check<'_> {
    /// Explicit headers and generator tags are declarations; body text is circumstantial.
    fn confidence(&self) -> u8 {
        match self {
            Check::Header(..) | Check::MetaTag(..) => 100,
            Check::Cookie(_) | Check::ScriptSrc(_) | Check::LinkHref(_) => 90,
            Check::Body(_) => 80,
        }
    }
}

struct FingerprintRule<'a> {
    tech_name: &'a str,
    category: &'a str,
    check: Check<'a>,
}

// Capture group 1, when present, is the version.
static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"nginx/([\d\.]+)").unwrap());
static RE_NGINX_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hr><center>nginx</center>").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache/([\d\.]+)").unwrap());
static RE_APACHE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache Server at").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"cloudflare").unwrap());
static RE_LITESPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"LiteSpeed").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ([\d\.]+)").unwrap());
static RE_WP_EMBED: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_WP_LOGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"wp-login\.php").unwrap());
static RE_JOOMLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Joomla!").unwrap());
static RE_DRUPAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"Drupal ?([\d\.]+)?").unwrap());
static RE_DRUPAL_ASSETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"/sites/default/files/|Drupal\.settings").unwrap());
static RE_SHOPIFY: Lazy<Regex> = Lazy::new(|| Regex::new(r"shopify").unwrap());
static RE_MAGENTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"magento").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHP/([\d\.]+)").unwrap());
static RE_PHPSESSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHPSESSID").unwrap());
static RE_ASPNET: Lazy<Regex> = Lazy::new(|| Regex::new(r"ASP\.NET").unwrap());
static RE_JSESSIONID: Lazy<Regex> = Lazy::new(|| Regex::new(r"JSESSIONID").unwrap());
static RE_DJANGO_CSRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_RUBY_RAILS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_rails_session").unwrap());
static RE_NEXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Next\.js ([\d\.]+)").unwrap());
static RE_NEXTJS_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/static/").unwrap());
static RE_NUXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"__NUXT__").unwrap());
static RE_ANGULAR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ng-version="([\d\.]+)""#).unwrap());
static RE_SOLIDJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-hk=").unwrap());
static RE_SVELTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"class=["']svelte-"#).unwrap());
static RE_GATSBY: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id=["']___gatsby["']"#).unwrap());
static RE_ASTRO: Lazy<Regex> = Lazy::new(|| Regex::new(r"Astro v([\d\.]+)").unwrap());
static RE_JQUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"jquery[\.min|\.slim|\.js|/](-|\?v=)?([\d\.]+)").unwrap());
static RE_JQUERY_FN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\.fn\.jquery: "([\d\.]+)""#).unwrap());
static RE_REACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"react-dom|data-reactroot|react\.development").unwrap());
static RE_VUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-app|__VUE_").unwrap());
static RE_BOOTSTRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"bootstrap.min.css").unwrap());
static RE_GOOGLE_ANALYTICS: Lazy<Regex> = Lazy::new(|| Regex::new(r"google-analytics.com/|googletagmanager.com/").unwrap());

/// Rules are applied in order; the first captured version wins.
static RULES: &[FingerprintRule] = &[
    FingerprintRule { tech_name: "Nginx", category: "Web Server", check: Check::Header("server", &RE_NGINX) },
    FingerprintRule { tech_name: "Nginx", category: "Web Server", check: Check::Body(&RE_NGINX_ERROR) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", check: Check::Header("server", &RE_APACHE) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", check: Check::Body(&RE_APACHE_ERROR) },
    FingerprintRule { tech_name: "Cloudflare", category: "CDN / WAF", check: Check::Header("server", &RE_CLOUDFLARE) },
    FingerprintRule { tech_name: "LiteSpeed", category: "Web Server", check: Check::Header("server", &RE_LITESPEED) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::MetaTag("generator", &RE_WORDPRESS) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::Body(&RE_WP_EMBED) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::Body(&RE_WP_LOGIN) },
    FingerprintRule { tech_name: "Joomla", category: "CMS", check: Check::MetaTag("generator", &RE_JOOMLA) },
    FingerprintRule { tech_name: "Drupal", category: "CMS", check: Check::MetaTag("generator", &RE_DRUPAL) },
    FingerprintRule { tech_name: "Drupal", category: "CMS", check: Check::Header("x-generator", &RE_DRUPAL) },
    FingerprintRule { tech_name: "Drupal", category: "CMS", check: Check::Body(&RE_DRUPAL_ASSETS) },
    FingerprintRule { tech_name: "Shopify", category: "E-commerce", check: Check::Header("x-shopid", &RE_SHOPIFY) },
    FingerprintRule { tech_name: "Magento", category: "E-commerce", check: Check::Cookie(&RE_MAGENTO) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Header("x-powered-by", &RE_PHP) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Cookie(&RE_PHPSESSID) },
    FingerprintRule { tech_name: "ASP.NET", category: "Framework", check: Check::Header("x-aspnet-version", &RE_ASPNET) },
    FingerprintRule { tech_name: "Java", category: "Language", check: Check::Cookie(&RE_JSESSIONID) },
    FingerprintRule { tech_name: "Python/Django", category: "Framework", check: Check::Cookie(&RE_DJANGO_CSRF) },
    FingerprintRule { tech_name: "Ruby on Rails", category: "Framework", check: Check::Cookie(&RE_RUBY_RAILS) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", check: Check::Header("x-powered-by", &RE_NEXTJS) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", check: Check::ScriptSrc(&RE_NEXTJS_SCRIPT) },
    FingerprintRule { tech_name: "Nuxt.js", category: "JS Framework", check: Check::Body(&RE_NUXTJS) },
    FingerprintRule { tech_name: "Angular", category: "JS Framework", check: Check::Body(&RE_ANGULAR) },
    FingerprintRule { tech_name: "SolidJS", category: "JS Framework", check: Check::Body(&RE_SOLIDJS) },
    FingerprintRule { tech_name: "Svelte", category: "JS Framework", check: Check::Body(&RE_SVELTE) },
    FingerprintRule { tech_name: "Gatsby", category: "JS Framework", check: Check::Body(&RE_GATSBY) },
    FingerprintRule { tech_name: "Astro", category: "JS Framework", check: Check::MetaTag("generator", &RE_ASTRO) },
    FingerprintRule { tech_name: "React", category: "JS Library", check: Check::Body(&RE_REACT) },
    FingerprintRule { tech_name: "Vue.js", category: "JS Library", check: Check::Body(&RE_VUE) },
    FingerprintRule { tech_name: "jQuery", category: "JS Library", check: Check::ScriptSrc(&RE_JQUERY) },
    FingerprintRule { tech_name: "jQuery", category: "JS Library", check: Check::Body(&RE_JQUERY_FN) },
    FingerprintRule { tech_name: "Bootstrap", category: "UI Framework", check: Check::LinkHref(&RE_BOOTSTRAP) },
    FingerprintRule { tech_name: "Google Analytics", category: "Analytics", check: Check::ScriptSrc(&RE_GOOGLE_ANALYTICS) },
];


/// Fetches `https://<domain>` and fingerprints the response.
pub async fn run_fingerprint_scan(
    fetcher: &dyn WebFetcher,
    domain: &str,
) -> CollaboratorResult<Vec<TechnologyFinding>> {
    info!(target = %domain, "Starting fingerprint scan.");
    let response = fetcher.fetch(&format!("https://{domain}")).await?;
    let technologies = fingerprint(&response);
    info!(count = %technologies.len(), "Fingerprint scan finished.");
    Ok(technologies)
}

/// Applies every rule to one response. Each technology is reported once,
/// with the first version any rule captured and the highest confidence.
pub fn fingerprint(response: &WebResponse) -> Vec<TechnologyFinding> {
    let cookies = response.cookies();
    let body = response.body.as_str();
    let document = Html::parse_document(body);

    let mut found: BTreeMap<String, TechnologyFinding> = BTreeMap::new();

    debug!(total_rules = %RULES.len(), "Applying fingerprinting rules.");
    for rule in RULES {
        let version = match &rule.check {
            Check::Header(name, re) => check_with_regex(response.header(name), re),
            Check::MetaTag(name, re) => check_meta_tag(&document, name, re),
            Check::Body(re) => check_with_regex(Some(body), re),
            Check::ScriptSrc(re) => check_script_src(&document, re),
            Check::LinkHref(re) => check_link_href(&document, re),
            Check::Cookie(re) => check_with_regex(Some(&cookies), re),
        };

        if let Some(v) = version {
            debug!(tech = %rule.tech_name, version = ?v, "Rule matched.");
            record(&mut found, rule.tech_name, rule.category, v, rule.check.confidence());
        }
    }

    // Anything the server announces but no rule knows about.
    for (header, category) in [("server", "Web Server"), ("x-powered-by", "Programming Language")] {
        if let Some((name, version)) = response.header(header).and_then(split_product) {
            let known = found.values().any(|t| t.name.eq_ignore_ascii_case(&name));
            if !known {
                record(&mut found, &name, category, version, 100);
            }
        }
    }

    found.into_values().collect()
}

fn record(
    found: &mut BTreeMap<String, TechnologyFinding>,
    name: &str,
    category: &str,
    version: Option<String>,
    confidence: u8,
) {
    let entry = found.entry(name.to_string()).or_insert_with(|| TechnologyFinding {
        name: name.to_string(),
        category: category.to_string(),
        version: None,
        confidence,
    });
    if entry.version.is_none() {
        entry.version = version;
    }
    entry.confidence = entry.confidence.max(confidence);
}

/// `"nginx/1.25.3 (Ubuntu)"` → `("nginx", Some("1.25.3"))`.
fn split_product(value: &str) -> Option<(String, Option<String>)> {
    let product = value.split_whitespace().next()?;
    let mut parts = product.splitn(2, '/');
    let name = parts.next().filter(|n| !n.is_empty())?.to_string();
    let version = parts.next().filter(|v| !v.is_empty()).map(str::to_string);
    Some((name, version))
}

/// A helper function that applies a regex to an optional string slice.
///
/// Returns `Some(version)` if the regex matches. The `version` itself is an `Option<String>`:
/// `Some(Some(String))` if a version was captured, `Some(None)` if the pattern matched
/// but no version was captured, and `None` if the pattern did not match at all.
fn check_with_regex(text_option: Option<&str>, re: &Regex) -> Option<Option<String>> {
    text_option.and_then(|text| {
        re.captures(text).map(|caps| {
            // Attempt to get the first capture group, which usually contains the version.
            caps.get(1)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        })
    })
}

/// Searches the parsed HTML for a specific meta tag and checks its content with a regex.
fn check_meta_tag(doc: &Html, name: &str, re: &Regex) -> Option<Option<String>> {
    let selector_str = format!("meta[name='{}']", name);
    if let Ok(selector) = Selector::parse(&selector_str) {
        let content = doc.select(&selector).next().and_then(|el| el.value().attr("content"));
        return check_with_regex(content, re);
    }
    None
}

/// Searches the parsed HTML for script tags and checks their `src` attributes with a regex.
fn check_script_src(doc: &Html, re: &Regex) -> Option<Option<String>> {
    if let Ok(selector) = Selector::parse("script[src]") {
        for el in doc.select(&selector) {
            if let Some(src) = el.value().attr("src") {
                if let Some(version) = check_with_regex(Some(src), re) {
                    return Some(version); // Return on first match.
                }
            }
        }
    }
    None
}

/// Searches the parsed HTML for link tags and checks their `href` attributes with a regex.
fn check_link_href(doc: &Html, re: &Regex) -> Option<Option<String>> {
    if let Ok(selector) = Selector::parse("link[href]") {
        for el in doc.select(&selector) {
            if let Some(href) = el.value().attr("href") {
                if let Some(version) = check_with_regex(Some(href), re) {
                    return Some(version); // Return on first match.
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn response(headers: &[(&'static str, &'static str)], body: &str) -> WebResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(*value));
        }
        WebResponse { status: 200, headers: map, body: body.to_string() }
    }

    fn find<'a>(techs: &'a [TechnologyFinding], name: &str) -> Option<&'a TechnologyFinding> {
        techs.iter().find(|t| t.name == name)
    }

    #[test]
    fn wordpress_site_behind_nginx() {
        let body = r#"<html><head>
            <meta name="generator" content="WordPress 6.4.2">
            <link rel="stylesheet" href="/wp-content/themes/x/bootstrap.min.css">
            <script src="/wp-includes/js/jquery/jquery.min.js?v=3.7.1"></script>
            </head><body></body></html>"#;
        let techs = fingerprint(&response(
            &[("server", "nginx/1.25.3"), ("x-powered-by", "PHP/8.2.1"), ("set-cookie", "PHPSESSID=abc; path=/")],
            body,
        ));

        let wp = find(&techs, "WordPress").unwrap();
        assert_eq!(wp.version.as_deref(), Some("6.4.2"));
        assert_eq!(wp.confidence, 100);
        assert_eq!(find(&techs, "Nginx").unwrap().version.as_deref(), Some("1.25.3"));
        assert_eq!(find(&techs, "PHP").unwrap().version.as_deref(), Some("8.2.1"));
        assert!(find(&techs, "Bootstrap").is_some());
        // Announced by a known rule; not repeated under the raw header name.
        assert!(find(&techs, "nginx").is_none());
    }

    #[test]
    fn unknown_server_header_is_reported_verbatim() {
        let techs = fingerprint(&response(&[("server", "Microsoft-IIS/10.0"), ("x-powered-by", "Express")], ""));
        let iis = find(&techs, "Microsoft-IIS").unwrap();
        assert_eq!(iis.category, "Web Server");
        assert_eq!(iis.version.as_deref(), Some("10.0"));
        let express = find(&techs, "Express").unwrap();
        assert_eq!(express.category, "Programming Language");
        assert!(express.version.is_none());
    }

    #[test]
    fn body_only_signals_have_lower_confidence() {
        let techs = fingerprint(&response(&[], r#"<div id="app" data-v-app></div><script>window.__NUXT__={}</script>"#));
        assert_eq!(find(&techs, "Vue.js").unwrap().confidence, 80);
        assert!(find(&techs, "Nuxt.js").is_some());
    }

    #[test]
    fn plain_page_has_no_technologies() {
        assert!(fingerprint(&response(&[], "<html><body>hello</body></html>")).is_empty());
    }

    #[test]
    fn product_tokens() {
        assert_eq!(split_product("Apache/2.4.58 (Debian)"), Some(("Apache".into(), Some("2.4.58".into()))));
        assert_eq!(split_product("cloudflare"), Some(("cloudflare".into(), None)));
        assert_eq!(split_product("   "), None);
    }
}
