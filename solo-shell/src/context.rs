//! Launch state shared by the relay and the lifecycle gate

use crate::proxy::ProxyData;

/// Paths and URL handed over by this or other launches
#[derive(Debug, Clone, Default)]
pub struct LaunchContext {
    send_paths: Vec<String>,
    start_url: Option<String>,
    sandbox_proxy: ProxyData,
}

impl LaunchContext {
    pub fn new(send_paths: Vec<String>, start_url: Option<String>) -> Self {
        Self {
            send_paths,
            start_url: start_url.filter(|url| !url.is_empty()),
            sandbox_proxy: ProxyData::default(),
        }
    }

    pub fn send_paths(&self) -> &[String] {
        &self.send_paths
    }

    pub fn has_send_paths(&self) -> bool {
        !self.send_paths.is_empty()
    }

    pub fn queue_send_paths(&mut self, paths: impl IntoIterator<Item = String>) {
        self.send_paths.extend(paths);
    }

    pub fn take_send_paths(&mut self) -> Vec<String> {
        std::mem::take(&mut self.send_paths)
    }

    pub fn start_url(&self) -> Option<&str> {
        self.start_url.as_deref()
    }

    pub fn set_start_url(&mut self, url: String) {
        if !url.is_empty() {
            self.start_url = Some(url);
        }
    }

    pub fn take_start_url(&mut self) -> Option<String> {
        self.start_url.take()
    }

    /// Proxy used while the application settings are not loaded
    pub fn sandbox_proxy(&self) -> &ProxyData {
        &self.sandbox_proxy
    }

    pub fn set_sandbox_proxy(&mut self, proxy: ProxyData) {
        self.sandbox_proxy = proxy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_start_url_is_none() {
        let mut context = LaunchContext::new(vec![], Some(String::new()));
        assert!(context.start_url().is_none());

        context.set_start_url(String::new());
        assert!(context.start_url().is_none());
    }

    #[test]
    fn test_send_paths_queue_and_take() {
        let mut context = LaunchContext::new(vec!["/a".into()], None);
        context.queue_send_paths(vec!["/b".to_string()]);
        assert_eq!(context.send_paths(), ["/a", "/b"]);

        assert_eq!(context.take_send_paths(), vec!["/a", "/b"]);
        assert!(!context.has_send_paths());
    }
}
