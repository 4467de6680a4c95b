//! Built-in category tables. Each entry is evaluated independently.
//!
//! Word boundaries are ASCII (`(?-u:\b)`); artifact text is often lossy UTF-8 from
//! binary containers.

use super::IndicatorKind as K;

/// Applied to the full text of an uploaded artifact.
pub const ARTIFACT_PATTERNS: &[(K, &str)] = &[
    // basic IOCs
    (K::Emails, r"(?i)(?-u:\b)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}(?-u:\b)"),
    (K::Ips, r"(?-u:\b)\d{1,3}(?:\.\d{1,3}){3}(?-u:\b)"),
    (K::Passwords, r#"(?i)(?-u:\b)pass(?:word)?["']?\s*[:=]\s*["']?.{4,20}["']?"#),
    (
        K::EmailUser,
        r#"(?i)(?-u:\b)(?:email|username)["']?\s*[:=]\s*["']?[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+"#,
    ),
    (K::Urls, r"(?i)(?:https?|ftp|tcp|smtp)://[^\s/$.?#].[^\s]*"),
    (K::Domains, r"(?i)(?-u:\b)(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}(?-u:\b)"),
    (K::TorDomains, r"(?i)[a-z0-9-]*\.onion(?-u:\b)"),
    // malware patterns
    (
        K::Base64,
        r"(?:[A-Za-z0-9+/]{4}){10,}(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?",
    ),
    (K::HexStrings, r"(?i)\\x[0-9a-f]{2}"),
    (
        K::SuspiciousComments,
        r"(?i)(?://|#|;|--)\s*(?:TODO|FIXME|XXX|MALICIOUS|HACK|EXPLOIT)",
    ),
    (
        K::SuspiciousFunctions,
        r"(?i)(?:eval|exec|system|passthru|shell_exec|popen|proc_open|assert|create_function)\s*\(",
    ),
    (K::ObfuscatedCode, r"[.+|^()\[\]$*?\\]{5,}"),
    (K::LongStrings, r"[^\x20-\x7E]{20,}"),
    // android components
    (
        K::SuspiciousIntents,
        r"(?i)android\.intent\.action\.(?:BOOT_COMPLETED|PACKAGE_ADDED|NEW_OUTGOING_CALL)",
    ),
    (K::ContentProviderAbuse, r"content://[a-zA-Z0-9._-]+/[a-zA-Z0-9._-]+"),
    (
        K::DangerousPermissions,
        r"(?i)(?-u:\b)android\.permission\.(?:READ_SMS|SEND_SMS|RECEIVE_BOOT_COMPLETED|READ_CALL_LOG|WRITE_CALL_LOG|RECORD_AUDIO|CAMERA|WRITE_SETTINGS|SYSTEM_ALERT_WINDOW)(?-u:\b)",
    ),
    (
        K::JavaExec,
        r"(?i)(?-u:\b)(?:Runtime\.getRuntime\(\)\.exec|ProcessBuilder|dalvik\.system\.DexClassLoader)(?-u:\b)",
    ),
    (
        K::SmaliShell,
        r"invoke-static \{.*\}, Ljava/lang/Runtime;->getRuntime\(\)Ljava/lang/Runtime;",
    ),
    (
        K::RatKeywords,
        r"(?i)(?-u:\b)(?:C2|CommandAndControl|BotNet|KeyLogger|ScreenCapture|RemoteShell|ClientSocket)(?-u:\b)",
    ),
    (K::FirebaseUrls, r"(?i)https://[a-z0-9-]+\.firebaseio\.com"),
    // data leakage
    (
        K::HardcodedApiKeys,
        r#"(?i)(?:api[_-]?key|secret|token|auth[_-]?key)['"\s:=]+['"]?[a-z0-9_-]{16,}"#,
    ),
    (K::FirebaseApiKeys, r"AIza[0-9A-Za-z_-]{35}"),
    (
        K::PrivateKeys,
        r"-----BEGIN (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----[\s\S]+?-----END (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----",
    ),
    // networking
    (K::InsecureHttp, r#"(?i)http://[^\s'"<>()]+"#),
    (
        K::WebviewUrls,
        r#"(?i)(?:loadUrl|loadDataWithBaseURL)\s*\(\s*["']https?://[^\s"']+"#,
    ),
    // dangerous API usage
    (K::WebviewJsInterface, r"(?i)\.addJavascriptInterface\s*\("),
    (
        K::TelephonyManager,
        r"(?i)get(?:Imei|Meid|SimSerialNumber|DeviceId|SubscriberId)",
    ),
    (
        K::SmsInteraction,
        r"(?i)sendTextMessage|getMessagesFromUri|getAllMessagesFromIcc",
    ),
    (K::ClipboardAccess, r"(?i)\.getPrimaryClip\s*\(\)"),
    (K::FileAccess, r"(?i)openFileOutput|openFileInput|getExternalFilesDir"),
    // exploit and ransomware vocabulary
    (
        K::ExploitKeywords,
        r"(?i)(?-u:\b)(?:Exploit|Payload|Shellcode|PrivEsc|LocalPrivilegeEscalation)(?-u:\b)",
    ),
    (
        K::RansomwareKeywords,
        r"(?i)(?-u:\b)(?:Encrypt|Decrypt|Ransom|AES256|RSA2048|Bitcoin|Monero|WalletAddress)(?-u:\b)",
    ),
    (
        K::AndroidShellAbuse,
        r"(?i)(?-u:\b)(?:pm\s+(?:list|install|uninstall|hide)|am\s+start|setprop|getprop|su\s*-c)(?-u:\b)",
    ),
    (
        K::PsSuspicious,
        r"(?i)(?:Start-Process\s+-WindowStyle\s+Hidden|Invoke-Expression|DownloadString|FromBase64String|New-Object\s+Net\.WebClient)(?-u:\b)",
    ),
    (
        K::DangerousApis,
        r"(?i)(?-u:\b)(?:VirtualAlloc|CreateRemoteThread|WriteProcessMemory|SetWindowsHookEx|RegSetValue)(?-u:\b)",
    ),
    (
        K::CharCodeObfuscation,
        r"(?i)String\.fromCharCode|chr\(|char\(|\\.{2,4}",
    ),
    // anti-analysis
    (
        K::AntiEmulator,
        r#"(?i)Build\.(?:MODEL|BRAND|DEVICE|PRODUCT|HARDWARE)\s*==\s*["'](?:generic|sdk|emulator)"#,
    ),
    (
        K::AntiDebug,
        r"android\.os\.Debug|isDebuggerConnected|android\.os\.SystemProperties",
    ),
    // obfuscation
    (
        K::XorObfuscation,
        r"(?i)(?-u:\b)char\s*(?:\[\s*\]\s*\w+|\w+\s*\[\s*\d*\s*\])\s*=\s*\{\s*(?:0x[0-9a-f]{2}\s*,\s*){5,}",
    ),
    (K::B64LargeStrings, r"(?:[A-Za-z0-9+/]{4}){20,}"),
    (
        K::StringFromCharcode,
        r"(?i)String\.fromCharCode\s*\((?:\d+,?\s*){3,}\)",
    ),
    // file paths
    (K::TempFileUse, r#"(?i)/data/local/tmp/[^\s"']+"#),
    (K::UncommonPaths, r#"(?i)/sdcard/\.hidden/[^\s"']+"#),
    (
        K::PermissionPatterns,
        r"(?i)android\.permission\.(?:RECORD_AUDIO|READ_SMS|WRITE_SETTINGS|READ_CALL_LOG|INTERNET|SYSTEM_ALERT_WINDOW|REQUEST_INSTALL_PACKAGES)",
    ),
    // payloads
    (K::DexLoader, r"(?i)DexClassLoader\s*\("),
    (K::ReflectionAbuse, r"(?i)Class\.forName|getMethod|invoke"),
    (K::IntentAbuse, r"(?i)Intent\.setComponent|Intent\.setClassName"),
    // root and native payloads
    (
        K::RootCommands,
        r"(?i)(?-u:\b)(?:su\s*-c|busybox|whoami|which\s+su|chmod\s+777)(?-u:\b)",
    ),
    (K::NativeExec, r#"(?i)Runtime\.getRuntime\(\)\.exec\s*\(["'][^"']+"#),
    (
        K::LoadNativeLibs,
        r#"(?i)System\.loadLibrary\s*\(\s*["'][^"']+["']\s*\)"#,
    ),
    // tokens
    (
        K::JwtTokens,
        r"(?-u:\b)eyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9._-]+\.[a-zA-Z0-9._-]+(?-u:\b)",
    ),
    (K::GoogleTokens, r"(?-u:\b)ya29\.[0-9A-Za-z_-]+(?-u:\b)"),
    (K::ApiKeys, r"(?-u:\b)AIza[0-9A-Za-z_-]{35}(?-u:\b)"),
    (K::FbAccessToken, r"(?-u:\b)EAACEdEose0cBA[0-9A-Za-z]+"),
    (
        K::RefreshTokens,
        r#"(?i)(?-u:\b)refresh[_-]?token["']?\s*[:=]\s*["']?[A-Za-z0-9._-]{20,}"#,
    ),
    // smali
    (
        K::Reflection,
        r"invoke-(?:virtual|static) \{.*\}, Ljava/lang/reflect/Method;->invoke",
    ),
    (K::SuChecks, r#"const-string [vp]\d+, "su""#),
    (K::RootDetection, r"Landroid/os/Build;->TAGS:.*test-keys"),
    (K::DynamicClassLoading, r"Ljava/lang/ClassLoader;->loadClass"),
    (K::NativeLibs, r#"System\.loadLibrary\("[^"]+"\)"#),
    (K::ExecCommands, r#"Runtime\.getRuntime\(\)\.exec\(["'][^"']+["']\)"#),
    // packers
    (K::Bangcle, r"libsecexe\.so|libSecShell\.so"),
    (K::Dexprotector, r"libDexProtector\.so|com\.licel\.dexprotector"),
    (K::ProtectorStrings, r#""This application is protected by""#),
    (K::EncryptedDexMarker, r"classes.*\.jar\.encrypted"),
    (K::AssetsPayload, r"assets/.*\.bin|assets/payload\.dex"),
    // web
    (K::WebviewBridge, r"window\.webkit\.messageHandlers"),
    (K::JsEval, r#"(?i)eval\(["'`](.*)["'`]\)"#),
    (K::JsIframeInject, r#"(?i)document\.write\(\s*['"]<iframe"#),
    (K::CryptoMiner, r"(?i)coinhive|miner\.js|cryptonight"),
    (K::MaliciousEndpoints, r"(?i)https?://[^\s]+/malware[^\s]*"),
    // script droppers
    (
        K::ScriptDroppers,
        r"(?i)(?:certutil\s+-decode|bitsadmin\s+/transfer|msiexec\s+/i|rundll32\s+[^,]+,\s*[^\s)]+)",
    ),
];

/// Applied to every text or blob cell of a structured datastore.
pub const DATASTORE_PATTERNS: &[(K, &str)] = &[
    (
        K::Domains,
        r"(?i)(?-u:\b)[a-zA-Z0-9.-]+\.(?:com|net|org|info|biz|ru|cn|io|xyz|gov|edu)(?-u:\b)",
    ),
    (
        K::Ipv4,
        r"(?-u:\b)(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)(?:\.(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)){3}(?-u:\b)",
    ),
    (K::Ipv6, r"(?-u:\b)(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}(?-u:\b)"),
    (K::Sha256, r"(?-u:\b)[a-fA-F0-9]{64}(?-u:\b)"),
    (K::Sha1, r"(?-u:\b)[a-fA-F0-9]{40}(?-u:\b)"),
    (K::Md5, r"(?-u:\b)[a-fA-F0-9]{32}(?-u:\b)"),
    (K::Emails, r"(?-u:\b)[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}(?-u:\b)"),
    (K::Urls, r"(?i)(?-u:\b)https?://[^\s/$.?#].[^\s]*(?-u:\b)"),
    (K::Ports, r"(?i)(?-u:\b)port\s*[:=]\s*\d{1,5}(?-u:\b)"),
    (
        K::AndroidPackages,
        r"(?-u:\b)(?:com|org|net|io|android|androidx|google|facebook|twitter)(?:\.[a-z0-9_]+)+(?-u:\b)",
    ),
    (K::AndroidContentUris, r"(?i)(?-u:\b)content://[a-zA-Z0-9._/]+"),
    (K::AndroidFilePaths, r#"(?i)/storage/emulated/0/[^\s'"]+"#),
    (K::AndroidAppDataPaths, r#"(?i)/data/data/[a-zA-Z0-9._-]+/[^\s'"]*"#),
    (K::SharedPrefsFiles, r"(?i)[a-zA-Z0-9._-]+_preferences\.xml"),
    (K::ImeiNumbers, r"(?-u:\b)\d{15}(?-u:\b)"),
    (K::ImsiNumbers, r"(?-u:\b)\d{14,15}(?-u:\b)"),
    (K::MacAddresses, r"(?-u:\b)(?:[0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}(?-u:\b)"),
    (
        K::Uuids,
        r"(?-u:\b)[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-5][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}(?-u:\b)",
    ),
    (K::FirebaseTokens, r"(?-u:\b)[A-Za-z0-9:_-]{140,}(?-u:\b)"),
    (K::PhoneNumbers, r"\+?\d{10,15}"),
    (
        K::GeoCoordinates,
        r"(?-u:\b)-?(?:[1-8]?\d(?:\.\d+)?|90(?:\.0+)?),\s*-?(?:180(?:\.0+)?|(?:1[0-7]\d|[1-9]?\d)(?:\.\d+)?)(?-u:\b)",
    ),
    (K::DeviceSerials, r"(?-u:\b)[A-Z0-9]{10,20}(?-u:\b)"),
    (
        K::AdvertisingId,
        r"(?-u:\b)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}(?-u:\b)",
    ),
    (K::GsfId, r"(?-u:\b)\d{10,15}(?-u:\b)"),
    (K::GoogleOauthTokens, r"(?-u:\b)ya29\.[A-Za-z0-9._-]{20,100}(?-u:\b)"),
    (K::GoogleApiKeys, r"(?-u:\b)AIza[0-9A-Za-z_-]{35}(?-u:\b)"),
    (
        K::WhatsappBackupFiles,
        r"(?i)(?-u:\b)msgstore\.db\.crypt(?:7|8|9|10|12|14)(?-u:\b)",
    ),
    (K::SignalDbFiles, r"(?i)(?-u:\b)signal-[a-z0-9]+\.db(?-u:\b)"),
    (K::SqliteDbFiles, r"(?i)(?-u:\b)[a-z0-9_]+\.db(?-u:\b)"),
    (K::SmsPdu, r"(?-u:\b)[0-9A-F]{10,}(?-u:\b)"),
    (K::WifiSsids, r#"(?i)SSID"\s*:\s*"[^"]+""#),
    (K::BluetoothNames, r"(?i)(?-u:\b)Bluetooth\s*Name\s*:\s*[^\r\n]+"),
    (K::Base64Keys, r"(?-u:\b)[A-Za-z0-9+/=]{40,}(?-u:\b)"),
    (
        K::JwtTokens,
        r"(?-u:\b)eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+(?-u:\b)",
    ),
    (K::CryptoSalts, r"(?i)(?-u:\b)[a-f0-9]{16,64}(?-u:\b)"),
    (
        K::LogcatTimestamps,
        r"(?-u:\b)\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}(?-u:\b)",
    ),
    (K::AndroidProperties, r"(?-u:\b)ro\.[a-z0-9._]+(?-u:\b)"),
    (
        K::AppSecrets,
        r#"(?i)(?-u:\b)(?:api_key|secret|token|password|auth)_?[:=]\s*['"][^'"]{8,}['"]"#,
    ),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn assert_unique(table: &[(K, &str)]) {
        let mut kinds = HashSet::new();
        for (kind, _) in table {
            assert!(kinds.insert(*kind), "kind listed twice: {kind}");
        }
    }

    #[test]
    fn each_kind_appears_once_per_table() {
        assert_unique(ARTIFACT_PATTERNS);
        assert_unique(DATASTORE_PATTERNS);
    }

    #[test]
    fn watchlist_kinds_are_not_pattern_driven() {
        for table in [ARTIFACT_PATTERNS, DATASTORE_PATTERNS] {
            for (kind, _) in table {
                assert!(!matches!(
                    kind,
                    K::SuspiciousDomains | K::SuspiciousKeywords | K::SuspiciousPackages
                ));
            }
        }
    }
}
