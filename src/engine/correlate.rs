use std::collections::HashMap;

use crate::model::{HttpProbe, NewSubdomainRecord};

/// Hard cap on stored URLs per subdomain per scan.
pub const MAX_URLS_PER_HOST: usize = 100;

/// Everything the pipeline stages produced for one scan.
#[derive(Debug, Default)]
pub struct StageOutputs {
    pub subdomains: Vec<String>,
    pub ports: HashMap<String, Vec<u16>>,
    pub probes: Vec<HttpProbe>,
    pub urls: Vec<String>,
}

/// Join the per-host outputs of the independent stages into one record per
/// subdomain.
///
/// Hosts missing from a stage's output get no data from it: no ports entry
/// means `ports = None`, no probe row means dead host with empty HTTP
/// fields. A discovered URL is assigned to the first subdomain (in
/// enumeration order) whose name occurs in its text; this is substring
/// containment, not URL parsing, so a URL matching several known subdomains
/// lands on the first one only.
pub fn correlate(scan_id: i64, domain: &str, outputs: StageOutputs) -> Vec<NewSubdomainRecord> {
    let StageOutputs {
        mut subdomains,
        ports,
        probes,
        urls,
    } = outputs;

    if subdomains.is_empty() {
        // A scan always investigates at least the target itself.
        subdomains.push(domain.to_string());
    }

    let probes: HashMap<String, HttpProbe> =
        probes.into_iter().map(|p| (p.host.clone(), p)).collect();

    let mut url_map: HashMap<&str, Vec<String>> = HashMap::new();
    for url in urls {
        if let Some(sub) = subdomains.iter().find(|s| url.contains(s.as_str())) {
            let bucket = url_map.entry(sub.as_str()).or_default();
            if bucket.len() < MAX_URLS_PER_HOST {
                bucket.push(url);
            }
        }
    }

    subdomains
        .iter()
        .map(|host| {
            let probe = probes.get(host);
            NewSubdomainRecord {
                scan_id,
                hostname: host.clone(),
                ip_address: probe.and_then(|p| p.ip.clone()),
                ports: ports.get(host).filter(|p| !p.is_empty()).cloned(),
                status_code: probe.and_then(|p| p.status_code),
                content_length: probe.and_then(|p| p.content_length),
                title: probe.and_then(|p| p.title.clone()),
                technologies: probe.map(|p| p.technologies.clone()).unwrap_or_default(),
                urls: url_map.remove(host.as_str()).filter(|u| !u.is_empty()),
                is_alive: probe.map(|p| p.alive).unwrap_or(false),
            }
        })
        .collect()
}
