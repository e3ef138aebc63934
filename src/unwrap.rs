use crate::error::{BannerError, Result};
use crate::models::{AdUnit, VastDocument};
use crate::parser;
use log::{debug, error, info, warn};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::{HashSet, VecDeque};
use std::path::Path;

/// Maximum depth of VAST wrapper chain to follow
pub const MAX_WRAPPER_DEPTH: usize = 10;

/// Unwrap a VAST document by following wrappers down to their InLine ads
///
/// Ads are returned in document order, depth first. Every banner found under
/// a wrapper also carries that wrapper's impression URLs. A wrapper that
/// cannot be fetched or parsed, that repeats an already visited URI, or that
/// sits at `MAX_WRAPPER_DEPTH` is dropped with a diagnostic; only a failure
/// to parse the root document is an error.
pub async fn unwrap_vast_async(xml_content: &str) -> Result<VastDocument> {
    let root = parser::parse_vast(xml_content)?;
    let version = root.version.clone();

    let mut visited_urls = HashSet::new();
    let mut result_ads = Vec::new();
    let mut queue: VecDeque<(AdUnit, usize, Vec<String>)> =
        root.ads.into_iter().map(|ad| (ad, 0, Vec::new())).collect();

    while let Some((mut ad, depth, inherited)) = queue.pop_front() {
        inherit_impressions(&mut ad, &inherited);

        let Some(vast_ad_tag_uri) = ad.wrapper_uri.take() else {
            result_ads.push(ad);
            continue;
        };

        // Chain impressions include this wrapper's own
        let mut chain = inherited;
        chain.extend(ad.impressions.iter().cloned());
        if !ad.banners.is_empty() {
            result_ads.push(ad);
        }

        if depth + 1 >= MAX_WRAPPER_DEPTH {
            warn!("Maximum wrapper depth exceeded at {}", vast_ad_tag_uri);
            continue;
        }
        if !visited_urls.insert(vast_ad_tag_uri.clone()) {
            warn!("Cycle detected in wrapper chain, skipping: {}", vast_ad_tag_uri);
            continue;
        }

        info!("Following wrapper: {}", vast_ad_tag_uri);
        let next = match fetch_vast_content_async(&vast_ad_tag_uri).await {
            Ok(next_xml) => parser::parse_vast(&next_xml),
            Err(e) => Err(e),
        };
        match next {
            Ok(next) => {
                // Children go first so the result keeps document order
                for next_ad in next.ads.into_iter().rev() {
                    queue.push_front((next_ad, depth + 1, chain.clone()));
                }
            }
            Err(e) => error!("Error unwrapping {}: {}", vast_ad_tag_uri, e),
        }
    }

    Ok(VastDocument {
        version,
        ads: result_ads,
    })
}

fn inherit_impressions(ad: &mut AdUnit, inherited: &[String]) {
    if inherited.is_empty() {
        return;
    }
    for banner in &mut ad.banners {
        banner.metadata.impressions.extend(inherited.iter().cloned());
    }
}

/// Fetch VAST content from a URL or file path
pub async fn fetch_vast_content_async(url_or_path: &str) -> Result<String> {
    if let Some(path) = url_or_path.strip_prefix("file://") {
        debug!("Reading from file: {}", path);
        return Ok(tokio::fs::read_to_string(path).await?);
    }

    if Path::new(url_or_path).exists() {
        debug!("Reading from local file: {}", url_or_path);
        return Ok(tokio::fs::read_to_string(url_or_path).await?);
    }

    fetch_vast_from_url(url_or_path).await
}

/// Fetch VAST XML from a URL
async fn fetch_vast_from_url(url: &str) -> Result<String> {
    // Generate a random request ID for tracking in logs
    let req_id: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();

    let url = url::Url::parse(url)?;

    info!("[{}] Fetching from URL: {}", req_id, url);
    let start_time = std::time::Instant::now();

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3))
        .build()?;

    let response = client.get(url).send().await.map_err(|e| {
        error!("[{}] Request failed after {:?}", req_id, start_time.elapsed());
        BannerError::Http(e)
    })?;

    debug!("[{}] Received response in {:?}", req_id, start_time.elapsed());

    if !response.status().is_success() {
        return Err(BannerError::Other(format!(
            "Failed to fetch URL: HTTP status {}",
            response.status()
        )));
    }

    let xml_content = response.text().await?;

    debug!("[{}] Total request completed in {:?}", req_id, start_time.elapsed());

    Ok(xml_content)
}
