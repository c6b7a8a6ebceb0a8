use crate::domain::model::CertificateRecord;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalDecision {
    /// 沒有可作為基礎的憑證，改為重新申請
    IssueNew,
    Renew,
    Reuse,
}

/// 依到期時間決定是否更新憑證
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateRenewalPolicy {
    renew_within_days: i64,
}

impl Default for CertificateRenewalPolicy {
    fn default() -> Self {
        Self::new(7)
    }
}

impl CertificateRenewalPolicy {
    pub fn new(renew_within_days: i64) -> Self {
        Self { renew_within_days }
    }

    pub fn renew_within_days(&self) -> i64 {
        self.renew_within_days
    }

    /// 剩餘天數 (無條件進位) 少於門檻即更新。無法解析的日期一律視為需要更新
    pub fn should_renew(&self, expires_at: &str, now: DateTime<Utc>) -> bool {
        let Some(expiry) = parse_expiry(expires_at) else {
            tracing::warn!("⚠️ Unparseable certificate expiry {:?}, renewing", expires_at);
            return true;
        };

        // 已過期一律更新；若以距離絕對值計算，過期超過門檻天數的憑證會被誤判為仍有效
        if expiry <= now {
            return true;
        }

        let diff_ms = (expiry - now).num_milliseconds();
        let days_remaining = (diff_ms + DAY_MS - 1) / DAY_MS;
        days_remaining < self.renew_within_days
    }

    pub fn decide(&self, record: Option<&CertificateRecord>, now: DateTime<Utc>) -> RenewalDecision {
        match record.and_then(|r| r.expires_at.as_deref()) {
            None => RenewalDecision::IssueNew,
            Some(expires_at) if self.should_renew(expires_at, now) => RenewalDecision::Renew,
            Some(_) => RenewalDecision::Reuse,
        }
    }
}

/// 接受 RFC 3339、certbot 的 `2026-01-14 12:00:00+00:00`，以及毫秒 epoch
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(expires_at: Option<String>) -> CertificateRecord {
        CertificateRecord {
            domains: vec!["foo.example.com".to_string()],
            expires_at,
            active: false,
        }
    }

    #[test]
    fn test_exactly_seven_days_is_not_renewed() {
        let policy = CertificateRenewalPolicy::default();
        let expires = (now() + Duration::days(7)).to_rfc3339();
        assert!(!policy.should_renew(&expires, now()));
    }

    #[test]
    fn test_six_days_is_renewed() {
        let policy = CertificateRenewalPolicy::default();
        let expires = (now() + Duration::days(6)).to_rfc3339();
        assert!(policy.should_renew(&expires, now()));
    }

    #[test]
    fn test_partial_day_rounds_up() {
        let policy = CertificateRenewalPolicy::default();
        let expires = (now() + Duration::days(6) + Duration::hours(1)).to_rfc3339();
        assert!(!policy.should_renew(&expires, now()));
    }

    #[test]
    fn test_unparseable_date_is_renewed() {
        let policy = CertificateRenewalPolicy::default();
        assert!(policy.should_renew("not a date", now()));
        assert!(policy.should_renew("", now()));
    }

    #[test]
    fn test_expired_certificate_is_renewed() {
        let policy = CertificateRenewalPolicy::default();
        let expired = (now() - Duration::days(30)).to_rfc3339();
        assert!(policy.should_renew(&expired, now()));
    }

    #[test]
    fn test_expired_beyond_threshold_is_renewed() {
        let policy = CertificateRenewalPolicy::default();
        let long_gone = (now() - Duration::days(365)).to_rfc3339();
        assert!(policy.should_renew(&long_gone, now()));

        let record = record(Some(long_gone));
        assert_eq!(policy.decide(Some(&record), now()), RenewalDecision::Renew);
    }

    #[test]
    fn test_expiry_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 5, 30, 8, 15, 0).unwrap();
        assert_eq!(parse_expiry("2026-05-30T08:15:00Z"), Some(expected));
        assert_eq!(parse_expiry("2026-05-30 08:15:00+00:00"), Some(expected));
        assert_eq!(
            parse_expiry(&expected.timestamp_millis().to_string()),
            Some(expected)
        );
    }

    #[test]
    fn test_decide() {
        let policy = CertificateRenewalPolicy::default();
        assert_eq!(policy.decide(None, now()), RenewalDecision::IssueNew);
        assert_eq!(
            policy.decide(Some(&record(None)), now()),
            RenewalDecision::IssueNew
        );
        assert_eq!(
            policy.decide(Some(&record(Some((now() + Duration::days(60)).to_rfc3339()))), now()),
            RenewalDecision::Reuse
        );
        assert_eq!(
            policy.decide(Some(&record(Some("garbage".to_string()))), now()),
            RenewalDecision::Renew
        );
    }

    #[test]
    fn test_custom_threshold() {
        let policy = CertificateRenewalPolicy::new(30);
        let expires = (now() + Duration::days(20)).to_rfc3339();
        assert!(policy.should_renew(&expires, now()));
    }
}
