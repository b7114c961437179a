use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::core::ObjectMeta;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::resources::common::standard_labels;

/// Characters generated passwords are drawn from.
///
/// Excludes characters the PSMDB operator's secret parsing rejects.
pub const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789~=+%^*/(){}!$|";

/// Length of generated administrator passwords
pub const PASSWORD_LENGTH: usize = 24;

/// Source of administrator passwords
pub trait PasswordGenerator: Send + Sync {
    fn generate(&self, len: usize) -> String;
}

/// Draws from a generator reseeded with wall-clock nanoseconds on every call
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeSeededGenerator;

impl PasswordGenerator for TimeSeededGenerator {
    fn generate(&self, len: usize) -> String {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len)
            .map(|_| PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())] as char)
            .collect()
    }
}

/// Copy a template secret's data and set the administrator password
pub fn credentials_data(
    template: &Secret,
    password_key: &str,
    password: &str,
) -> BTreeMap<String, ByteString> {
    let mut data = template.data.clone().unwrap_or_default();
    data.insert(
        password_key.to_string(),
        ByteString(password.as_bytes().to_vec()),
    );
    data
}

/// Generate an `Opaque` secret owned by `cluster_name`
pub fn generate_secret(
    name: &str,
    cluster_name: &str,
    data: BTreeMap<String, ByteString>,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(standard_labels(cluster_name)),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Default::default()
    }
}

/// A secret value as UTF-8, empty when the key is missing
pub fn string_value(secret: &Secret, key: &str) -> String {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| String::from_utf8_lossy(&value.0).into_owned())
        .unwrap_or_default()
}
