use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub assets: AssetConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default = "default_companies")]
    pub companies: Vec<CompanyConfig>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Where offers are published
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    /// Listing page whose links point at the per-month offer posts.
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Label written into the `Source` column.
    #[serde(default = "default_source_name")]
    pub source_name: String,

    /// Page render timeout.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Settle time after navigation, for lazily inserted images.
    #[serde(default = "default_render_wait_ms")]
    pub render_wait_ms: u64,
}

/// Image classification policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetConfig {
    #[serde(default = "default_media_domain")]
    pub media_domain: String,

    /// Substrings marking decorative images (logos, icons, social buttons).
    #[serde(default = "default_exclude_markers")]
    pub exclude_markers: Vec<String>,

    /// Substrings marking blurred placeholders and thumbnails.
    #[serde(default = "default_low_res_markers")]
    pub low_res_markers: Vec<String>,
}

/// Table recognition service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecognitionConfig {
    #[serde(default = "default_recognition_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_recognition_timeout_secs")]
    pub timeout_secs: u64,
}

/// Market position inputs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankingConfig {
    /// Pricing page per brand; `{slug}` is replaced by the company's slug.
    #[serde(default = "default_pricing_url_template")]
    pub pricing_url_template: String,

    /// Monthly sales flash report with a maker-wise units table.
    #[serde(default = "default_sales_report_url")]
    pub sales_report_url: String,

    #[serde(default = "default_pricing_wait_ms")]
    pub pricing_wait_ms: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Maximum image assets processed per company.
    #[serde(default = "default_max_assets")]
    pub max_assets_per_company: usize,

    #[serde(default = "default_placeholder_text")]
    pub placeholder_text: String,
}

/// One tracked manufacturer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompanyConfig {
    pub name: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Offer post URL with `{month}` (lowercase name) and `{year}` placeholders.
    #[serde(default)]
    pub fallback_url_template: Option<String>,

    #[serde(default)]
    pub pricing_slug: Option<String>,

    #[serde(default)]
    pub reliability_rating: Option<f64>,

    #[serde(default)]
    pub service_centers: Option<u32>,
}

impl CompanyConfig {
    /// Keywords used for index matching; the company name when none are set.
    pub fn match_keywords(&self) -> Vec<String> {
        if self.keywords.is_empty() {
            vec![self.name.clone()]
        } else {
            self.keywords.clone()
        }
    }

    /// "Maruti Suzuki" → "maruti"
    pub fn slug(&self) -> String {
        self.pricing_slug.clone().unwrap_or_else(|| {
            self.name
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_lowercase()
        })
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    1000
}
fn default_jitter_ms() -> u64 {
    400
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) auto-offer-intel/0.1".to_string()
}
fn default_index_url() -> String {
    "https://www.autopunditz.com/blog".to_string()
}
fn default_source_name() -> String {
    "AutoPunditz".to_string()
}
fn default_render_timeout_ms() -> u64 {
    60_000
}
fn default_render_wait_ms() -> u64 {
    3_000
}
fn default_media_domain() -> String {
    "wixstatic.com".to_string()
}
fn default_exclude_markers() -> Vec<String> {
    ["logo", "icon", "favicon", "facebook", "instagram", "twitter", "youtube", "linkedin", "whatsapp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_low_res_markers() -> Vec<String> {
    ["blur_", "/w_20,", "/w_40,", "/w_49,", "/w_60,", "/w_80,", "lowres", "thumbnail"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_recognition_endpoint() -> String {
    "http://127.0.0.1:8765/tables".to_string()
}
fn default_recognition_timeout_secs() -> u64 {
    120
}
fn default_pricing_url_template() -> String {
    "https://www.cardekho.com/cars/{slug}".to_string()
}
fn default_sales_report_url() -> String {
    "https://www.autopunditz.com/car-sales-data".to_string()
}
fn default_pricing_wait_ms() -> u64 {
    7_000
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/auto_intel.duckdb")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_true() -> bool {
    true
}
fn default_max_assets() -> usize {
    25
}
fn default_placeholder_text() -> String {
    "No active schemes found".to_string()
}

fn company(name: &str, keywords: &[&str], template: Option<&str>) -> CompanyConfig {
    CompanyConfig {
        name: name.to_string(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        fallback_url_template: template.map(str::to_string),
        pricing_slug: None,
        reliability_rating: None,
        service_centers: None,
    }
}

fn default_companies() -> Vec<CompanyConfig> {
    const POST: &str = "https://www.autopunditz.com/post";
    let t = |slug: &str| format!("{POST}/{slug}-car-offers-{{month}}-{{year}}");
    let mut mg = company("MG Motor", &["MG", "MG Motor"], Some(t("mg").as_str()));
    mg.pricing_slug = Some("mg".to_string());
    let mut maruti = company("Maruti Suzuki", &["Maruti", "Maruti Suzuki", "Nexa", "Arena"], Some(t("maruti-suzuki").as_str()));
    maruti.pricing_slug = Some("maruti-suzuki".to_string());
    vec![
        maruti,
        company("Hyundai", &["Hyundai"], Some(t("hyundai").as_str())),
        company("Tata Motors", &["Tata"], Some(t("tata").as_str())),
        company("Mahindra", &["Mahindra"], Some(t("mahindra").as_str())),
        company("Kia", &["Kia"], Some(t("kia").as_str())),
        mg,
        company("Toyota", &["Toyota"], Some(t("toyota").as_str())),
        company("Honda", &["Honda"], Some(t("honda").as_str())),
        company("Renault", &["Renault"], Some(t("renault").as_str())),
        company("Nissan", &["Nissan"], Some(t("nissan").as_str())),
        company("Skoda", &["Skoda"], Some(t("skoda").as_str())),
        company("Volkswagen", &["Volkswagen", "VW"], Some(t("volkswagen").as_str())),
        company("BYD", &["BYD"], None),
        company("Volvo", &["Volvo"], None),
    ]
}

// ── Section defaults ─────────────────────────────────────────────────────────

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            source_name: default_source_name(),
            render_timeout_ms: default_render_timeout_ms(),
            render_wait_ms: default_render_wait_ms(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            media_domain: default_media_domain(),
            exclude_markers: default_exclude_markers(),
            low_res_markers: default_low_res_markers(),
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_recognition_endpoint(),
            timeout_secs: default_recognition_timeout_secs(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            pricing_url_template: default_pricing_url_template(),
            sales_report_url: default_sales_report_url(),
            pricing_wait_ms: default_pricing_wait_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            output_dir: default_output_dir(),
            run_migrations: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_assets_per_company: default_max_assets(),
            placeholder_text: default_placeholder_text(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("AUTO_INTEL").separator("__"))
            .build()?;

        let app_cfg = cfg.try_deserialize().unwrap_or_else(|e| {
            warn!("Invalid configuration ({}), using defaults", e);
            AppConfig::with_default_companies()
        });
        Ok(app_cfg)
    }

    /// `Default` leaves `companies` empty; this fills in the built-in registry.
    pub fn with_default_companies() -> Self {
        Self {
            companies: default_companies(),
            ..Self::default()
        }
    }

    pub fn company(&self, name: &str) -> Option<&CompanyConfig> {
        self.companies
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Companies for one run: all configured ones when `names` is empty,
    /// otherwise the named ones. Repeats (any case) are kept once, first
    /// occurrence wins. Unknown names are an error.
    pub fn select_companies(&self, names: &[String]) -> Result<Vec<CompanyConfig>> {
        let picked: Vec<&CompanyConfig> = if names.is_empty() {
            self.companies.iter().collect()
        } else {
            names
                .iter()
                .map(|n| {
                    self.company(n)
                        .ok_or_else(|| anyhow::anyhow!("Unknown company {:?} (not in config)", n))
                })
                .collect::<Result<_>>()?
        };

        let mut out: Vec<CompanyConfig> = Vec::with_capacity(picked.len());
        for c in picked {
            if out.iter().any(|o| o.name.eq_ignore_ascii_case(&c.name)) {
                warn!("{} listed more than once, running it once", c.name);
                continue;
            }
            out.push(c.clone());
        }
        Ok(out)
    }
}
