//! Fixed request header set shared by HEAD probes, ranged GETs and listing fetches.

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "curl/7.69.1";

/// Headers attached to every request: `user-agent` and `accept: */*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    pub user_agent: String,
}

impl Default for RequestHeaders {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RequestHeaders {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    /// Header lines in `Name: value` form.
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("user-agent: {}", self.user_agent.trim()),
            "accept: */*".to_string(),
        ]
    }

    /// Build the curl header list, optionally with a `range` line appended.
    pub fn curl_list(&self, range: Option<&str>) -> Result<curl::easy::List, curl::Error> {
        let mut list = curl::easy::List::new();
        for line in self.lines() {
            list.append(&line)?;
        }
        if let Some(range) = range {
            list.append(&format!("range: {}", range))?;
        }
        Ok(list)
    }
}
