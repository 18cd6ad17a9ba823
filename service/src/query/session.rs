//! [`Query`] collection related to a [`Session`].

use std::convert::Infallible;

#[cfg(doc)]
use crate::domain::user::Session;
use crate::Service;

use super::Query;

/// Queries the lifetime of a newly issued [`Session`], in minutes.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenTtl;

impl<Db, Ch> Query<TokenTtl> for Service<Db, Ch> {
    type Ok = u64;
    type Err = Infallible;

    async fn execute(&self, _: TokenTtl) -> Result<Self::Ok, Self::Err> {
        Ok(self.config().session_ttl.as_secs() / 60)
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use crate::{
        infra::{cache, database},
        Config, Query as _, Service,
    };

    use super::TokenTtl;

    #[tokio::test]
    async fn reports_minutes() {
        let mut config = Config::new(b"secret");
        config.session_ttl = Duration::from_secs(90 * 60 + 59);
        let svc = Service::new(
            config,
            database::Memory::default(),
            cache::Memory::default(),
        );

        assert_eq!(svc.execute(TokenTtl).await.unwrap(), 90);
    }
}
