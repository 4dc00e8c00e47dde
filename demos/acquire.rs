//! Shares one authenticated session across concurrent tasks: the first acquire exchanges the
//! client credentials against a mock token endpoint and every later caller reuses the handle.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use iam_session_cache::{
	ClientCredentials, Configuration, ConnectionCache, bootstrap::ReqwestBootstrapConnector,
	http::ReqwestHttpClient, reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/iam/oauth2/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let config = Configuration::new(server.url("/iam")).with_client_credentials(
		ClientCredentials::new("demo-client", "super-secret", "demo-exchange", "exchange-secret"),
	);
	let http_client = ReqwestHttpClient::with_client(Client::builder().build()?);
	let cache = ConnectionCache::builder(config)
		.connector(Arc::new(ReqwestBootstrapConnector::with_http_client(http_client)))
		.build();
	let tasks = (0..8)
		.map(|_| {
			let cache = cache.clone();

			tokio::spawn(async move { cache.acquire().await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		let handle = task.await??;

		println!("{} -> {}.", handle.id(), handle.endpoint("users")?);
	}

	println!("Cache metrics: {:?}.", cache.metrics());

	token_mock.assert_async().await;

	Ok(())
}
