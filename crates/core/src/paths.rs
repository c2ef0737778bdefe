use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".rentwatch"))
            .unwrap_or_else(|| PathBuf::from(".rentwatch"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Newline-delimited log of every listing already acted upon.
    pub fn seen_listings_file(&self) -> PathBuf {
        self.base.join("seen_listings.txt")
    }

    pub fn browser_dir(&self) -> PathBuf {
        self.base.join("browser")
    }

    pub fn browser_profile_dir(&self, session_name: &str) -> PathBuf {
        let safe_name = session_name.replace([':', '/', '\\'], "_");
        self.browser_dir().join("sessions").join(safe_name)
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.browser_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
