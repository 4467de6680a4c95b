//! # IOC Module
//!
//! Indicator-of-compromise matching over artifact text. The category taxonomy is
//! data: each [`PatternSet`] is built from a static `(IndicatorKind, pattern)` table
//! and evaluated by iteration, so adding a category never touches control flow.

pub mod heuristics;
pub mod tables;

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use heuristics::{Heuristics, NO_SUSPICIOUS_COMBINATION};

macro_rules! indicator_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Fixed taxonomy of indicator categories produced by any engine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum IndicatorKind {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl IndicatorKind {
            pub const ALL: &'static [IndicatorKind] = &[$(IndicatorKind::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(IndicatorKind::$variant => $name,)+
                }
            }
        }
    };
}

indicator_kinds! {
    // network
    Emails => "emails",
    Ips => "ips",
    Ipv4 => "ipv4",
    Ipv6 => "ipv6",
    Urls => "urls",
    Domains => "domains",
    TorDomains => "tor_domains",
    Ports => "ports",
    MacAddresses => "mac_addresses",
    InsecureHttp => "insecure_http",
    FirebaseUrls => "firebase_urls",
    MaliciousEndpoints => "malicious_endpoints",
    WebviewUrls => "webview_urls",
    // credentials and secrets
    Passwords => "passwords",
    EmailUser => "email_user",
    HardcodedApiKeys => "hardcoded_api_keys",
    FirebaseApiKeys => "firebase_api_keys",
    ApiKeys => "api_keys",
    GoogleApiKeys => "google_api_keys",
    PrivateKeys => "private_keys",
    JwtTokens => "jwt_tokens",
    GoogleTokens => "google_tokens",
    GoogleOauthTokens => "google_oauth_tokens",
    FbAccessToken => "fb_access_token",
    RefreshTokens => "refresh_tokens",
    FirebaseTokens => "firebase_tokens",
    AppSecrets => "app_secrets",
    Base64Keys => "base64_keys",
    CryptoSalts => "crypto_salts",
    // hashes and identifiers
    Sha256 => "sha256",
    Sha1 => "sha1",
    Md5 => "md5",
    Uuids => "uuids",
    AdvertisingId => "advertising_id",
    ImeiNumbers => "imei_numbers",
    ImsiNumbers => "imsi_numbers",
    GsfId => "gsf_id",
    DeviceSerials => "device_serials",
    PhoneNumbers => "phone_numbers",
    SmsPdu => "sms_pdu",
    GeoCoordinates => "geo_coordinates",
    WifiSsids => "wifi_ssids",
    BluetoothNames => "bluetooth_names",
    LogcatTimestamps => "logcat_timestamps",
    // obfuscation
    Base64 => "base64",
    B64LargeStrings => "b64_large_strings",
    HexStrings => "hex_strings",
    ObfuscatedCode => "obfuscated_code",
    LongStrings => "long_strings",
    CharCodeObfuscation => "char_code_obfuscation",
    StringFromCharcode => "string_from_charcode",
    XorObfuscation => "xor_obfuscation",
    Bangcle => "bangcle",
    Dexprotector => "dexprotector",
    ProtectorStrings => "protector_strings",
    EncryptedDexMarker => "encrypted_dex_marker",
    // code execution
    SuspiciousComments => "suspicious_comments",
    SuspiciousFunctions => "suspicious_functions",
    JavaExec => "java_exec",
    SmaliShell => "smali_shell",
    NativeExec => "native_exec",
    ExecCommands => "exec_commands",
    PsSuspicious => "ps_suspicious",
    DangerousApis => "dangerous_apis",
    ScriptDroppers => "script_droppers",
    JsEval => "js_eval",
    JsIframeInject => "js_iframe_inject",
    WebviewBridge => "webview_bridge",
    WebviewJsInterface => "webview_js_interface",
    // android components
    SuspiciousIntents => "suspicious_intents",
    ContentProviderAbuse => "content_provider_abuse",
    DangerousPermissions => "dangerous_permissions",
    PermissionPatterns => "permission_patterns",
    TelephonyManager => "telephony_manager",
    SmsInteraction => "sms_interaction",
    ClipboardAccess => "clipboard_access",
    FileAccess => "file_access",
    IntentAbuse => "intent_abuse",
    DexLoader => "dex_loader",
    DynamicClassLoading => "dynamic_class_loading",
    ReflectionAbuse => "reflection_abuse",
    Reflection => "reflection",
    LoadNativeLibs => "load_native_libs",
    NativeLibs => "native_libs",
    AssetsPayload => "assets_payload",
    AndroidPackages => "android_packages",
    AndroidContentUris => "android_content_uris",
    AndroidFilePaths => "android_file_paths",
    AndroidAppDataPaths => "android_app_data_paths",
    AndroidProperties => "android_properties",
    SharedPrefsFiles => "shared_prefs_files",
    WhatsappBackupFiles => "whatsapp_backup_files",
    SignalDbFiles => "signal_db_files",
    SqliteDbFiles => "sqlite_db_files",
    TempFileUse => "temp_file_use",
    UncommonPaths => "uncommon_paths",
    // shell and root
    AndroidShellAbuse => "android_shell_abuse",
    RootCommands => "root_commands",
    SuChecks => "su_checks",
    RootDetection => "root_detection",
    // anti-analysis
    AntiEmulator => "anti_emulator",
    AntiDebug => "anti_debug",
    // threat vocabulary
    RatKeywords => "rat_keywords",
    ExploitKeywords => "exploit_keywords",
    RansomwareKeywords => "ransomware_keywords",
    CryptoMiner => "crypto_miner",
    // datastore watchlists
    SuspiciousDomains => "suspicious_domains",
    SuspiciousKeywords => "suspicious_keywords",
    SuspiciousPackages => "suspicious_packages",
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category to distinct literal matches, in first-occurrence order.
pub type IndicatorMap = BTreeMap<IndicatorKind, Vec<String>>;

/// Ordered set of literal values: insertion order kept, exact duplicates dropped.
#[derive(Debug, Default, Clone)]
pub struct ValueSet {
    values: Vec<String>,
    seen: HashSet<String>,
}

impl ValueSet {
    pub fn insert(&mut self, value: &str) -> bool {
        if self.seen.contains(value) {
            return false;
        }
        self.seen.insert(value.to_string());
        self.values.push(value.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

/// Aggregates matches across many texts (one artifact, or every cell of a datastore).
///
/// A kind only gets an entry once it has at least one value, so an accumulator never
/// yields a present-but-empty category.
#[derive(Debug, Default, Clone)]
pub struct IndicatorAccumulator {
    sets: BTreeMap<IndicatorKind, ValueSet>,
}

impl IndicatorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: IndicatorKind, value: &str) {
        self.sets.entry(kind).or_default().insert(value);
    }

    pub fn into_sets(self) -> BTreeMap<IndicatorKind, ValueSet> {
        self.sets
    }

    pub fn into_map(self) -> IndicatorMap {
        self.sets
            .into_iter()
            .map(|(kind, set)| (kind, set.into_values()))
            .collect()
    }
}

/// Direct matches plus the heuristic block for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReport {
    #[serde(flatten)]
    pub indicators: IndicatorMap,
    pub heuristics: Heuristics,
}

impl IndicatorReport {
    pub fn has(&self, kind: IndicatorKind) -> bool {
        self.indicators.contains_key(&kind)
    }

    pub fn total_matches(&self) -> usize {
        self.indicators.values().map(Vec::len).sum()
    }

    /// True when no category matched and no heuristic fired.
    pub fn is_clean(&self) -> bool {
        self.indicators.is_empty()
            && self.heuristics.high_entropy_strings.is_empty()
            && !self.heuristics.has_alerts()
    }
}

/// A compiled, immutable category table.
#[derive(Debug)]
pub struct PatternSet {
    patterns: Vec<(IndicatorKind, Regex)>,
}

static ARTIFACT_SET: Lazy<PatternSet> = Lazy::new(|| {
    PatternSet::compile(tables::ARTIFACT_PATTERNS).expect("artifact pattern table compiles")
});

static DATASTORE_SET: Lazy<PatternSet> = Lazy::new(|| {
    PatternSet::compile(tables::DATASTORE_PATTERNS).expect("datastore pattern table compiles")
});

impl PatternSet {
    pub fn compile(table: &[(IndicatorKind, &str)]) -> Result<Self, regex::Error> {
        let mut patterns = Vec::with_capacity(table.len());
        for (kind, source) in table {
            patterns.push((*kind, Regex::new(source)?));
        }
        Ok(Self { patterns })
    }

    /// Categories applied to whole-artifact text.
    pub fn artifact() -> &'static PatternSet {
        &ARTIFACT_SET
    }

    /// Categories applied to individual datastore cell values.
    pub fn datastore() -> &'static PatternSet {
        &DATASTORE_SET
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Run every category over `text`, adding literal matches to `acc`.
    pub fn collect(&self, text: &str, acc: &mut IndicatorAccumulator) {
        for (kind, regex) in &self.patterns {
            for m in regex.find_iter(text) {
                acc.add(*kind, m.as_str());
            }
        }
    }

    /// Direct matching followed by the heuristic pass.
    pub fn scan(&self, text: &str) -> IndicatorReport {
        let mut acc = IndicatorAccumulator::new();
        self.collect(text, &mut acc);
        let indicators = acc.into_map();
        let heuristics = Heuristics::evaluate(text, &indicators);
        IndicatorReport {
            indicators,
            heuristics,
        }
    }
}

/// Scan artifact text with the built-in artifact table.
pub fn scan_text(text: &str) -> IndicatorReport {
    PatternSet::artifact().scan(text)
}
