use std::time::Duration;

use configcat::{ClientConfig, PollingMode, User};

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("configcat=info"))
        .init();

    let sdk_key = std::env::var("CONFIGCAT_SDK_KEY")
        .unwrap_or_else(|_| "PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ".to_owned());
    let client = ClientConfig::from_sdk_key(sdk_key)
        .polling_mode(PollingMode::auto_with(
            Duration::from_secs(60),
            Duration::from_secs(5),
        ))
        .to_client()
        .unwrap();

    client
        .hooks()
        .add_on_config_changed(|config| println!("Config changed: {} settings", config.settings.len()));

    // The first evaluation waits for the initial fetch (at most `max_init_wait`).
    let enabled = client.get_value("isAwesomeFeatureEnabled", false, None);
    println!("isAwesomeFeatureEnabled: {enabled}");

    let user = User::new("#SOME-USER-ID#").email("configcat@example.com");
    let details = client.get_value_details("isPOCFeatureEnabled", false, Some(&user));
    println!(
        "isPOCFeatureEnabled: {} (variation {:?}, error {:?})",
        details.value, details.variation_id, details.error
    );

    for (key, value) in client.get_all_values(Some(&user)) {
        println!("{key}: {value}");
    }

    client.close();
}
