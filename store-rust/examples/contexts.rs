use dotenvy::dotenv;
use std::{env, sync::Arc};
use tracing_subscriber::EnvFilter;
use veemee_sdk::{FileCredentialStore, VeemeeClient, VeemeeClientOptions};
use veemee_store::{auth_status, ensure_dev_jwt, ContextStore, DevAuth, NewContext};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let credentials_path =
        env::var("VEEMEE_CREDENTIALS_FILE").unwrap_or_else(|_| ".veemee/credentials.json".into());
    let credentials = Arc::new(FileCredentialStore::new(credentials_path));
    let api = Arc::new(VeemeeClient::new(VeemeeClientOptions::from_env()));

    ensure_dev_jwt(api.as_ref(), credentials.as_ref(), &DevAuth::from_env())
        .await
        .unwrap();
    println!(
        "auth: {:?}",
        auth_status(credentials.as_ref()).await.unwrap()
    );

    let store = ContextStore::builder(api, credentials).build();
    store.hydrate().await;

    for context in store.visible_contexts() {
        println!("{:>4}  {:<24} {}", context.id, context.name, context.skin_id);
    }
    println!("active: {:?}", store.active_context().map(|row| row.name));

    if store.visible_contexts().is_empty() {
        store.create_context(NewContext::new("Scratch"));
    }

    let ids: Vec<i64> = store.visible_contexts().iter().map(|row| row.id).collect();
    store.prefetch_personas_for_contexts(ids.clone()).await;
    for id in ids {
        let names: Vec<String> = store
            .personas_for(id)
            .into_iter()
            .map(|persona| persona.display_name)
            .collect();
        println!("context {id}: {names:?}");
    }

    store.flush().await;
}
