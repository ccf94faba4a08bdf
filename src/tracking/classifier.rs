//! Bot / 设备 / 浏览器启发式分类
//!
//! 规则表按声明顺序自上而下求值，首个命中即返回。顺序是语义的一部分：
//! - Chromium 内核的 Edge UA 同时含 "edg/" 与 "chrome/"，Edge 必须先于 Chrome
//! - 移动端 token 先于平板 token，带 iPad/Android token 的设备因此
//!   归为 mobile，这是既定的启发式局限，不做"修复"

use serde::{Deserialize, Serialize};
use strum::AsRefStr;
use ts_rs::TS;

/// 设备类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, AsRefStr)]
#[ts(export, export_to = "../dashboard/src/api/types.generated.ts")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Device {
    Mobile,
    Tablet,
    Desktop,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// 浏览器类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, AsRefStr)]
#[ts(export, export_to = "../dashboard/src/api/types.generated.ts")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Browser {
    Edge,
    Chrome,
    Firefox,
    Safari,
    Opera,
    Ie,
    Other,
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// 设备规则：任一 token 命中（小写包含匹配）即归入该类别
struct DeviceRule {
    label: Device,
    tokens: &'static [&'static str],
}

/// 有序设备规则表，mobile 在前
const DEVICE_RULES: &[DeviceRule] = &[
    DeviceRule {
        label: Device::Mobile,
        tokens: &[
            "mobile",
            "android",
            "iphone",
            "ipad",
            "ipod",
            "blackberry",
            "iemobile",
            "opera mini",
        ],
    },
    DeviceRule {
        label: Device::Tablet,
        tokens: &["tablet", "ipad", "playbook", "silk"],
    },
];

/// 浏览器规则：谓词接收小写 UA，首个命中即返回
struct BrowserRule {
    label: Browser,
    matches: fn(&str) -> bool,
}

/// 有序浏览器规则表，Edge 必须在 Chrome 之前
const BROWSER_RULES: &[BrowserRule] = &[
    BrowserRule {
        label: Browser::Edge,
        matches: |ua| ua.contains("edg/"),
    },
    BrowserRule {
        label: Browser::Chrome,
        matches: |ua| ua.contains("chrome/") && !ua.contains("edg/"),
    },
    BrowserRule {
        label: Browser::Firefox,
        matches: |ua| ua.contains("firefox/"),
    },
    BrowserRule {
        label: Browser::Safari,
        matches: |ua| ua.contains("safari/") && !ua.contains("chrome/"),
    },
    BrowserRule {
        label: Browser::Opera,
        matches: |ua| ua.contains("opera/") || ua.contains("opr/"),
    },
    BrowserRule {
        label: Browser::Ie,
        matches: |ua| ua.contains("msie") || ua.contains("trident/"),
    },
];

/// UA 分类器，bot token 黑名单由配置注入
#[derive(Debug, Clone)]
pub struct ClientClassifier {
    bot_tokens: Vec<String>,
}

impl ClientClassifier {
    /// 构造分类器，token 统一转小写后比对
    pub fn new(bot_tokens: &[String]) -> Self {
        Self {
            bot_tokens: bot_tokens.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// UA 是否命中 bot 黑名单
    ///
    /// UA 缺失返回 false：缺失不构成 bot 的证据（fail open）。
    pub fn is_bot(&self, user_agent: Option<&str>) -> bool {
        let Some(ua) = user_agent else {
            return false;
        };
        let ua = ua.to_lowercase();
        self.bot_tokens.iter().any(|token| ua.contains(token))
    }

    /// 识别设备类别，UA 缺失返回 None，无 token 命中归为 desktop
    pub fn detect_device(&self, user_agent: Option<&str>) -> Option<Device> {
        let ua = user_agent?.to_lowercase();
        for rule in DEVICE_RULES {
            if rule.tokens.iter().any(|token| ua.contains(token)) {
                return Some(rule.label);
            }
        }
        Some(Device::Desktop)
    }

    /// 识别浏览器类别，UA 缺失返回 None，无规则命中归为 other
    pub fn detect_browser(&self, user_agent: Option<&str>) -> Option<Browser> {
        let ua = user_agent?.to_lowercase();
        for rule in BROWSER_RULES {
            if (rule.matches)(&ua) {
                return Some(rule.label);
            }
        }
        Some(Browser::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingConfig;

    fn classifier() -> ClientClassifier {
        ClientClassifier::new(&TrackingConfig::default().bot_tokens)
    }

    // ===== bot 识别 =====

    #[test]
    fn googlebot_is_flagged() {
        let c = classifier();
        assert!(c.is_bot(Some("Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)")));
    }

    #[test]
    fn desktop_chrome_is_not_flagged() {
        let c = classifier();
        assert!(!c.is_bot(Some(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/91.0"
        )));
    }

    #[test]
    fn http_clients_and_headless_are_flagged() {
        let c = classifier();
        assert!(c.is_bot(Some("curl/8.5.0")));
        assert!(c.is_bot(Some("python-requests/2.31")));
        assert!(c.is_bot(Some("Mozilla/5.0 HeadlessChrome/120.0")));
        assert!(c.is_bot(Some("PostmanRuntime/7.36.0")));
    }

    #[test]
    fn absent_ua_fails_open() {
        let c = classifier();
        assert!(!c.is_bot(None));
    }

    #[test]
    fn bot_match_is_case_insensitive() {
        let c = classifier();
        assert!(c.is_bot(Some("SEMRUSH Audit Bot")));
    }

    // ===== 设备识别 =====

    #[test]
    fn iphone_is_mobile() {
        let c = classifier();
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
        assert_eq!(c.detect_device(Some(ua)), Some(Device::Mobile));
    }

    #[test]
    fn ipad_matches_mobile_before_tablet() {
        // iPad 同时命中 mobile 与 tablet token，规则顺序决定归为 mobile
        let c = classifier();
        let ua = "Mozilla/5.0 (iPad; CPU OS 16_0 like Mac OS X) AppleWebKit/605.1.15";
        assert_eq!(c.detect_device(Some(ua)), Some(Device::Mobile));
    }

    #[test]
    fn kindle_silk_is_tablet() {
        let c = classifier();
        let ua = "Mozilla/5.0 (X11; Linux x86_64) Silk/3.2 like Chrome/103.0 Safari/537.36";
        assert_eq!(c.detect_device(Some(ua)), Some(Device::Tablet));
    }

    #[test]
    fn plain_desktop_ua_is_desktop() {
        let c = classifier();
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/91.0";
        assert_eq!(c.detect_device(Some(ua)), Some(Device::Desktop));
    }

    #[test]
    fn absent_ua_has_no_device() {
        let c = classifier();
        assert_eq!(c.detect_device(None), None);
    }

    // ===== 浏览器识别 =====

    #[test]
    fn chromium_edge_wins_over_chrome() {
        let c = classifier();
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
        assert_eq!(c.detect_browser(Some(ua)), Some(Browser::Edge));
    }

    #[test]
    fn chrome_without_edge_token() {
        let c = classifier();
        let ua = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";
        assert_eq!(c.detect_browser(Some(ua)), Some(Browser::Chrome));
    }

    #[test]
    fn firefox_detected() {
        let c = classifier();
        let ua = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert_eq!(c.detect_browser(Some(ua)), Some(Browser::Firefox));
    }

    #[test]
    fn safari_excludes_chrome_uas() {
        let c = classifier();
        let safari = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
                      Version/17.0 Safari/605.1.15";
        assert_eq!(c.detect_browser(Some(safari)), Some(Browser::Safari));
        // Chrome UA 也带 Safari/ token，但 Chrome 规则在前
        let chrome = "Mozilla/5.0 AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";
        assert_eq!(c.detect_browser(Some(chrome)), Some(Browser::Chrome));
    }

    #[test]
    fn opera_via_opr_token() {
        let c = classifier();
        let ua = "Mozilla/5.0 AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36 OPR/106.0.0.0";
        // Opera 的 Chromium UA 带 chrome/，按规则顺序命中 Chrome；
        // 纯 OPR token（无 chrome/）才归为 Opera
        assert_eq!(c.detect_browser(Some(ua)), Some(Browser::Chrome));
        assert_eq!(
            c.detect_browser(Some("Opera/9.80 (Windows NT 6.1) Presto/2.12.388 Version/12.18")),
            Some(Browser::Opera)
        );
    }

    #[test]
    fn internet_explorer_via_trident() {
        let c = classifier();
        let ua = "Mozilla/5.0 (Windows NT 10.0; WOW64; Trident/7.0; rv:11.0) like Gecko";
        assert_eq!(c.detect_browser(Some(ua)), Some(Browser::Ie));
    }

    #[test]
    fn unknown_ua_is_other() {
        let c = classifier();
        assert_eq!(c.detect_browser(Some("SomeNewAgent/1.0")), Some(Browser::Other));
        assert_eq!(c.detect_browser(None), None);
    }
}
