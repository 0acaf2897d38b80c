use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use super::VulnerabilitySource;
use crate::model::{AffectedVersionRange, CveData};

/// Index of the version field in a colon-delimited CPE 2.3 string.
const CPE_VERSION_FIELD: usize = 5;

/// Page size for the NVD CVE API; the service caps responses at 2000.
const PAGE_SIZE: usize = 2000;

/// Queries the NVD CVE 2.0 API for vulnerabilities matching a
/// product-level CPE identifier.
pub struct NvdChecker {
    client: reqwest::Client,
    api_url: String,
}

impl NvdChecker {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
        }
    }

    async fn fetch_page(&self, cpe: &str, start_index: usize) -> Result<NvdResponse> {
        let per_page = PAGE_SIZE.to_string();
        let start = start_index.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("virtualMatchString", cpe),
                ("resultsPerPage", per_page.as_str()),
                ("startIndex", start.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

#[async_trait]
impl VulnerabilitySource for NvdChecker {
    fn name(&self) -> &'static str {
        "nvd"
    }

    async fn query(&self, cpe: &str) -> Result<Vec<CveData>> {
        tracing::debug!(cpe, "querying nvd");
        let mut vulnerabilities = Vec::new();
        let mut start_index = 0;

        loop {
            let page = self.fetch_page(cpe, start_index).await?;
            let fetched = page.vulnerabilities.len();

            for item in page.vulnerabilities {
                vulnerabilities.push(item.cve.into_cve_data());
            }

            start_index += fetched;
            if start_index >= page.total_results || fetched == 0 {
                break;
            }
        }

        tracing::debug!(cpe, count = vulnerabilities.len(), "nvd query finished");
        Ok(vulnerabilities)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NvdResponse {
    #[serde(default)]
    total_results: usize,
    #[serde(default)]
    vulnerabilities: Vec<NvdVulnerability>,
}

#[derive(Deserialize)]
struct NvdVulnerability {
    cve: NvdCve,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NvdCve {
    id: String,
    #[serde(default)]
    descriptions: Vec<NvdDescription>,
    #[serde(default)]
    configurations: Vec<NvdConfiguration>,
}

impl NvdCve {
    fn into_cve_data(self) -> CveData {
        let description = self
            .descriptions
            .iter()
            .find(|d| d.lang == "en")
            .or_else(|| self.descriptions.first())
            .map(|d| d.value.clone());

        let affected_versions = self
            .configurations
            .into_iter()
            .flat_map(|c| c.nodes)
            .flat_map(|n| n.cpe_match)
            .filter(|m| m.vulnerable)
            .map(NvdCpeMatch::into_range)
            .collect();

        CveData {
            id: self.id,
            description,
            affected_versions,
        }
    }
}

#[derive(Deserialize)]
struct NvdDescription {
    lang: String,
    value: String,
}

#[derive(Deserialize)]
struct NvdConfiguration {
    #[serde(default)]
    nodes: Vec<NvdNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NvdNode {
    #[serde(default)]
    cpe_match: Vec<NvdCpeMatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NvdCpeMatch {
    #[serde(default)]
    vulnerable: bool,
    criteria: String,
    version_start_including: Option<String>,
    version_start_excluding: Option<String>,
    version_end_including: Option<String>,
    version_end_excluding: Option<String>,
}

impl NvdCpeMatch {
    /// A concrete version in the criteria string becomes an exact bound;
    /// wildcard criteria rely on the explicit boundary fields.
    fn into_range(self) -> AffectedVersionRange {
        let exact = self
            .criteria
            .split(':')
            .nth(CPE_VERSION_FIELD)
            .filter(|v| !v.is_empty() && *v != "*" && *v != "-")
            .map(str::to_string);

        AffectedVersionRange {
            cpe_string: Some(self.criteria),
            exact,
            start_including: self.version_start_including,
            start_excluding: self.version_start_excluding,
            end_including: self.version_end_including,
            end_excluding: self.version_end_excluding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "totalResults": 1,
        "vulnerabilities": [{
            "cve": {
                "id": "CVE-2020-0001",
                "descriptions": [
                    {"lang": "es", "value": "descripcion"},
                    {"lang": "en", "value": "request smuggling in redirect handling"}
                ],
                "configurations": [{
                    "nodes": [{
                        "cpeMatch": [
                            {
                                "vulnerable": true,
                                "criteria": "cpe:2.3:a:alamofireswift:alamofire:*:*:*:*:*:*:*:*",
                                "versionEndExcluding": "4.9.0"
                            },
                            {
                                "vulnerable": false,
                                "criteria": "cpe:2.3:o:apple:ios:*:*:*:*:*:*:*:*"
                            },
                            {
                                "vulnerable": true,
                                "criteria": "cpe:2.3:a:alamofireswift:alamofire:5.0.0:beta1:*:*:*:*:*:*"
                            }
                        ]
                    }]
                }]
            }
        }]
    }"#;

    #[test]
    fn response_maps_to_cve_data() {
        let response: NvdResponse = serde_json::from_str(RESPONSE).unwrap();
        assert_eq!(response.total_results, 1);

        let cve = response
            .vulnerabilities
            .into_iter()
            .next()
            .unwrap()
            .cve
            .into_cve_data();

        assert_eq!(cve.id, "CVE-2020-0001");
        assert_eq!(
            cve.description.as_deref(),
            Some("request smuggling in redirect handling")
        );
        // the non-vulnerable platform entry is dropped
        assert_eq!(cve.affected_versions.len(), 2);
        assert_eq!(
            cve.affected_versions[0].end_excluding.as_deref(),
            Some("4.9.0")
        );
        assert_eq!(cve.affected_versions[0].exact, None);
        assert_eq!(cve.affected_versions[1].exact.as_deref(), Some("5.0.0"));
    }

    #[test]
    fn missing_configurations_yield_empty_ranges() {
        let minimal = r#"{"vulnerabilities": [{"cve": {"id": "CVE-2021-0002"}}]}"#;
        let response: NvdResponse = serde_json::from_str(minimal).unwrap();

        let cve = response
            .vulnerabilities
            .into_iter()
            .next()
            .unwrap()
            .cve
            .into_cve_data();

        assert_eq!(cve.id, "CVE-2021-0002");
        assert_eq!(cve.description, None);
        assert!(cve.affected_versions.is_empty());
    }
}
