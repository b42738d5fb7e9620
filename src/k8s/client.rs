// Client creation with custom user-agent support
use crate::error::Result;
use hyper::http::{HeaderName, HeaderValue};
use kube::{Client, Config};
use tracing::warn;

/// Push a `user-agent` header onto `config`.
///
/// An agent that is not a valid header value is logged and skipped, leaving the
/// default kube user agent in place.
pub fn add_user_agent_header(config: &mut Config, user_agent: Option<&str>) {
    let Some(user_agent) = user_agent else {
        return;
    };
    match HeaderValue::from_str(user_agent) {
        Ok(header_value) => config
            .headers
            .push((HeaderName::from_static("user-agent"), header_value)),
        Err(e) => warn!("Invalid user agent {:?}: {}", user_agent, e),
    }
}

/// Create a new k8s client to interact with k8s cluster api
///
/// # Errors
///
/// Will return `Err` if the kube config can not be inferred or the client can not be built
pub async fn new(custom_user_agent: Option<&str>) -> Result<Client> {
    let mut config = Config::infer().await?;
    add_user_agent_header(&mut config, custom_user_agent);
    let client = Client::try_from(config)?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> Config {
        Config::new("https://127.0.0.1:6443".parse().unwrap())
    }

    #[test]
    fn test_user_agent_header_is_added() {
        let mut config = local_config();
        add_user_agent_header(&mut config, Some(crate::k8s::USER_AGENT));

        let (name, value) = config.headers.last().unwrap();
        assert_eq!(name.as_str(), "user-agent");
        assert!(value.to_str().unwrap().starts_with("navidash/"));
    }

    #[test]
    fn test_invalid_user_agent_is_skipped() {
        let mut config = local_config();
        let before = config.headers.len();
        add_user_agent_header(&mut config, Some("bad\nagent"));
        add_user_agent_header(&mut config, None);
        assert_eq!(config.headers.len(), before);
    }
}
