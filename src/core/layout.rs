use crate::domain::model::{CertificatePaths, Domain};
use std::path::{Path, PathBuf};

/// nginx 的 sites-available / sites-enabled 與 staging 目錄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    pub available_dir: PathBuf,
    pub enabled_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl SiteLayout {
    pub fn new(available_dir: PathBuf, enabled_dir: PathBuf, staging_dir: PathBuf) -> Self {
        Self {
            available_dir,
            enabled_dir,
            staging_dir,
        }
    }

    pub fn available_path(&self, name: &str) -> PathBuf {
        self.available_dir.join(name)
    }

    pub fn enabled_path(&self, name: &str) -> PathBuf {
        self.enabled_dir.join(name)
    }

    pub fn staging_path(&self, name: &str) -> PathBuf {
        self.staging_dir.join(name)
    }

    /// 連結目標是否位於 available 目錄內
    pub fn points_into_available(&self, target: &Path) -> bool {
        target.starts_with(&self.available_dir)
    }
}

/// 憑證目錄樹。路徑由網域推算，不可自由指定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateLayout {
    pub live_dir: PathBuf,
    pub wildcard_dir: PathBuf,
}

impl CertificateLayout {
    pub fn new(live_dir: PathBuf, wildcard_dir: PathBuf) -> Self {
        Self {
            live_dir,
            wildcard_dir,
        }
    }

    pub fn paths_for(&self, domain: &Domain) -> CertificatePaths {
        let dir = if domain.is_seeded {
            self.wildcard_dir.join(&domain.base_domain)
        } else {
            self.live_dir.join(&domain.full_domain)
        };
        CertificatePaths {
            fullchain: dir.join("fullchain.pem"),
            privkey: dir.join("privkey.pem"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_paths_for_custom_and_seeded() {
        let layout = CertificateLayout::new(
            PathBuf::from("/certs/live"),
            PathBuf::from("/certs/wildcard"),
        );

        let custom = layout.paths_for(&Domain::custom("shop.acme.io"));
        assert_eq!(
            custom.fullchain,
            PathBuf::from("/certs/live/shop.acme.io/fullchain.pem")
        );
        assert_eq!(
            custom.privkey,
            PathBuf::from("/certs/live/shop.acme.io/privkey.pem")
        );

        let seeded = layout.paths_for(&Domain::seeded(
            "acme.tenants.example.com",
            "tenants.example.com",
        ));
        assert_eq!(
            seeded.fullchain,
            PathBuf::from("/certs/wildcard/tenants.example.com/fullchain.pem")
        );
    }

    #[test]
    fn test_points_into_available() {
        let layout = SiteLayout::new(
            PathBuf::from("/etc/nginx/sites-available"),
            PathBuf::from("/etc/nginx/sites-enabled"),
            PathBuf::from("/tmp/warden"),
        );
        assert!(layout.points_into_available(Path::new("/etc/nginx/sites-available/foo")));
        assert!(!layout.points_into_available(Path::new("/var/www/foo")));
    }
}
