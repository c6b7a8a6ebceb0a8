//! Domain key allow-list regions.
//!
//! A region is a block of nginx configuration between two marker comments
//! tagged with the full domain:
//!
//! ```text
//! # DOMAIN KEY CONFIG START - foo.example.com
//! ...
//! if ($http_x_domain_key !~ "^(default|k1)$") {
//!     return 403;
//! }
//! # DOMAIN KEY CONFIG END - foo.example.com
//! ```
//!
//! The key list inside the `if` condition is the only persisted record of
//! which keys a tenant has granted. A region is rendered only while more
//! than one key remains, since every tenant always carries its default key.

use crate::utils::error::{Result, SiteError};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const START_MARKER: &str = "# DOMAIN KEY CONFIG START - ";
pub const END_MARKER: &str = "# DOMAIN KEY CONFIG END - ";

const INDENT: &str = "    ";

/// 既有區塊無法解析時的處理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionParsePolicy {
    /// 視為沒有既有金鑰並繼續
    #[default]
    FailOpen,
    /// 回傳 `RegionParseAmbiguous`
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region<'a> {
    Absent,
    Present(&'a str),
    /// 只有開始標記，內容為該標記行
    Unterminated(&'a str),
}

/// `(prefix, region?, suffix)` 切分結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSplit<'a> {
    pub prefix: &'a str,
    pub region: Region<'a>,
    pub suffix: &'a str,
}

impl<'a> RegionSplit<'a> {
    /// 找出 `full_domain` 的第一個區塊 (非貪婪：到第一個對應的結束標記為止)
    pub fn parse(text: &'a str, full_domain: &str) -> Self {
        let start = marker_regex(START_MARKER, full_domain);
        let end = marker_regex(END_MARKER, full_domain);

        let Some(start_match) = start.find(text) else {
            return Self {
                prefix: "",
                region: Region::Absent,
                suffix: text,
            };
        };

        match end.find(&text[start_match.end()..]) {
            Some(end_match) => {
                let region_end = start_match.end() + end_match.end();
                Self {
                    prefix: &text[..start_match.start()],
                    region: Region::Present(&text[start_match.start()..region_end]),
                    suffix: &text[region_end..],
                }
            }
            None => Self {
                prefix: &text[..start_match.start()],
                region: Region::Unterminated(start_match.as_str()),
                suffix: &text[start_match.end()..],
            },
        }
    }

    pub fn region_text(&self) -> Option<&'a str> {
        match self.region {
            Region::Present(text) => Some(text),
            _ => None,
        }
    }

    /// 以新的區塊 (或不放區塊) 取代舊區塊。其餘內容不變，只修剪接縫處的空白
    pub fn splice(&self, replacement: Option<&str>) -> String {
        let head = self.prefix.trim_end();
        let tail = trim_leading_blank_lines(self.suffix);

        let mut parts: Vec<&str> = Vec::new();
        if !head.is_empty() {
            parts.push(head);
        }
        if let Some(region) = replacement.filter(|r| !r.trim().is_empty()) {
            parts.push(region);
        }
        if !tail.trim().is_empty() {
            parts.push(tail);
        }
        parts.join("\n")
    }

    /// 既有區塊的縮排
    fn indent(&self) -> &'a str {
        match self.region {
            Region::Present(text) | Region::Unterminated(text) => {
                let trimmed = text.trim_start_matches([' ', '\t']);
                &text[..text.len() - trimmed.len()]
            }
            Region::Absent => "",
        }
    }
}

fn marker_regex(marker: &str, full_domain: &str) -> Regex {
    let pattern = format!(
        r"(?m)^[ \t]*{}{}[ \t\r]*$",
        regex::escape(marker),
        regex::escape(full_domain)
    );
    Regex::new(&pattern).expect("escaped marker pattern is valid")
}

fn trim_leading_blank_lines(s: &str) -> &str {
    let content = s.trim_start();
    let leading = &s[..s.len() - content.len()];
    match leading.rfind('\n') {
        Some(i) => &s[i + 1..],
        None => s,
    }
}

/// 從區塊中的 `!~ "^(a|b)$"` 條件取出金鑰。舊格式 `!~ (a|b))` 也接受
pub fn parse_keys(region: &str) -> std::result::Result<Vec<String>, String> {
    let anchored = Regex::new(r#"!~\s*"\^\(([^()"]*)\)\$""#).map_err(|e| e.to_string())?;
    let legacy = Regex::new(r"!~\s*\(([A-Za-z0-9|]*)\)\)").map_err(|e| e.to_string())?;

    let inner = anchored
        .captures(region)
        .or_else(|| legacy.captures(region))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| "no key expression found".to_string())?;

    let mut keys: Vec<String> = Vec::new();
    for key in inner.split('|') {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!("unexpected key entry {:?}", key));
        }
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    Ok(keys)
}

/// `unique((existing ∪ add) − remove)`，保留第一次出現的順序
pub fn resolve_keys(existing: &[String], add: &[String], remove: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for key in existing.iter().chain(add) {
        if !remove.contains(key) && !keys.contains(key) {
            keys.push(key.clone());
        }
    }
    keys
}

/// 金鑰合併的計算結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPlan {
    pub existing: Vec<String>,
    pub keys: Vec<String>,
}

impl KeyPlan {
    /// 單一金鑰不構成限制
    pub fn restricts(&self) -> bool {
        self.keys.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct AccessControlEditor {
    header_variable: String,
    forbidden_root: String,
    forbidden_page: String,
    policy: RegionParsePolicy,
}

impl Default for AccessControlEditor {
    fn default() -> Self {
        Self {
            header_variable: header_variable("X-Domain-Key"),
            forbidden_root: "/etc/nginx/common".to_string(),
            forbidden_page: "/4xx.html".to_string(),
            policy: RegionParsePolicy::FailOpen,
        }
    }
}

/// `X-Domain-Key` -> `$http_x_domain_key`
fn header_variable(header: &str) -> String {
    format!("$http_{}", header.to_ascii_lowercase().replace('-', "_"))
}

impl AccessControlEditor {
    pub fn with_header(mut self, header: &str) -> Self {
        self.header_variable = header_variable(header);
        self
    }

    pub fn with_forbidden_root(mut self, root: String) -> Self {
        self.forbidden_root = root;
        self
    }

    pub fn with_forbidden_page(mut self, page: String) -> Self {
        self.forbidden_page = page;
        self
    }

    pub fn with_policy(mut self, policy: RegionParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RegionParsePolicy {
        self.policy
    }

    /// 讀取既有金鑰並計算合併後的金鑰
    pub fn plan(
        &self,
        split: &RegionSplit<'_>,
        full_domain: &str,
        keys_to_add: &[String],
        keys_to_remove: &[String],
    ) -> Result<KeyPlan> {
        let existing = self.existing_keys(split, full_domain)?;
        let keys = resolve_keys(&existing, keys_to_add, keys_to_remove);
        Ok(KeyPlan { existing, keys })
    }

    pub fn existing_keys(&self, split: &RegionSplit<'_>, full_domain: &str) -> Result<Vec<String>> {
        match split.region {
            Region::Absent => Ok(Vec::new()),
            Region::Present(text) => match parse_keys(text) {
                Ok(keys) => Ok(keys),
                Err(reason) => self.malformed(full_domain, reason),
            },
            Region::Unterminated(_) => {
                self.malformed(full_domain, "start marker without end marker".to_string())
            }
        }
    }

    /// 自訂網域的設定檔只服務單一網域，沒有標記區塊時也接受舊版直接寫在 server 區塊內的規則
    pub fn site_keys(&self, text: &str, full_domain: &str) -> Result<Vec<String>> {
        let split = RegionSplit::parse(text, full_domain);
        match split.region {
            Region::Absent if text.contains("!~") => match parse_keys(text) {
                Ok(keys) => {
                    tracing::info!(
                        "🔁 Found {} unmarked domain key(s) for {}, rewriting as a marked region",
                        keys.len(),
                        full_domain
                    );
                    Ok(keys)
                }
                Err(reason) => self.malformed(full_domain, reason),
            },
            _ => self.existing_keys(&split, full_domain),
        }
    }

    /// 以整份自訂網域設定檔計算合併後的金鑰
    pub fn plan_site(
        &self,
        text: &str,
        full_domain: &str,
        keys_to_add: &[String],
        keys_to_remove: &[String],
    ) -> Result<KeyPlan> {
        let existing = self.site_keys(text, full_domain)?;
        let keys = resolve_keys(&existing, keys_to_add, keys_to_remove);
        Ok(KeyPlan { existing, keys })
    }

    fn malformed(&self, full_domain: &str, reason: String) -> Result<Vec<String>> {
        match self.policy {
            RegionParsePolicy::FailOpen => {
                tracing::warn!(
                    "⚠️ Domain key region for {} is malformed ({}), treating it as empty",
                    full_domain,
                    reason
                );
                Ok(Vec::new())
            }
            RegionParsePolicy::Reject => Err(SiteError::RegionParseAmbiguous {
                domain: full_domain.to_string(),
                reason,
            }),
        }
    }

    /// 403 規則本體 (不含標記)
    pub fn rule(&self, keys: &[String], indent: &str) -> String {
        let lines = [
            format!("root {};", self.forbidden_root),
            "error_page 403 @forbidden;".to_string(),
            "location @forbidden {".to_string(),
            format!("{}rewrite ^(.*)$ {} break;", INDENT, self.forbidden_page),
            "}".to_string(),
            format!(
                "if ({} !~ \"^({})$\") {{",
                self.header_variable,
                keys.join("|")
            ),
            format!("{}return 403;", INDENT),
            "}".to_string(),
        ];
        lines
            .iter()
            .map(|line| format!("{}{}", indent, line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 縮排一層、放在 server 區塊內的規則
    pub fn server_rule(&self, keys: &[String]) -> String {
        self.rule(keys, INDENT)
    }

    /// 用標記包住區塊本體
    pub fn wrap(full_domain: &str, body: &str, indent: &str) -> String {
        format!(
            "{indent}{start}{domain}\n{body}\n{indent}{end}{domain}",
            indent = indent,
            start = START_MARKER,
            end = END_MARKER,
            domain = full_domain,
            body = body.trim_end()
        )
    }

    /// 放進 443 server 區塊內的片段；金鑰不足兩個時為 None
    pub fn snippet(&self, full_domain: &str, plan: &KeyPlan) -> Option<String> {
        plan.restricts()
            .then(|| Self::wrap(full_domain, &self.server_rule(&plan.keys), INDENT))
    }

    /// 在文字中就地合併 `full_domain` 的區塊
    pub fn merge(
        &self,
        existing_text: &str,
        full_domain: &str,
        keys_to_add: &[String],
        keys_to_remove: &[String],
    ) -> Result<String> {
        let split = RegionSplit::parse(existing_text, full_domain);
        let indent = split.indent().to_string();
        self.merge_split(
            &split,
            full_domain,
            keys_to_add,
            keys_to_remove,
            |keys| Ok(self.rule(keys, &indent)),
            &indent,
        )
    }

    /// 與 `merge` 相同，但區塊本體由 `render_body` 依最終金鑰產生
    pub fn merge_with<F>(
        &self,
        existing_text: &str,
        full_domain: &str,
        keys_to_add: &[String],
        keys_to_remove: &[String],
        render_body: F,
    ) -> Result<String>
    where
        F: FnOnce(&[String]) -> Result<String>,
    {
        let split = RegionSplit::parse(existing_text, full_domain);
        self.merge_split(&split, full_domain, keys_to_add, keys_to_remove, render_body, "")
    }

    fn merge_split<F>(
        &self,
        split: &RegionSplit<'_>,
        full_domain: &str,
        keys_to_add: &[String],
        keys_to_remove: &[String],
        render_body: F,
        indent: &str,
    ) -> Result<String>
    where
        F: FnOnce(&[String]) -> Result<String>,
    {
        let plan = self.plan(split, full_domain, keys_to_add, keys_to_remove)?;
        tracing::debug!(
            "Domain keys for {}: {:?} -> {:?}",
            full_domain,
            plan.existing,
            plan.keys
        );

        if !plan.restricts() {
            return Ok(split.splice(None));
        }

        let body = render_body(&plan.keys)?;
        let region = Self::wrap(full_domain, &body, indent);
        Ok(split.splice(Some(&region)))
    }
}
