//! Stripe integration via REST API (no SDK dependency)
//!
//! Order placement creates a PaymentIntent; the client completes it with the
//! returned secret and then calls `/api/orders/confirm-payment`, which reads
//! the intent status back from Stripe.

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A created PaymentIntent
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Create a PaymentIntent for an amount in minor units (cents),
/// tagged with the ordering user's id.
pub async fn create_payment_intent(
    secret_key: &str,
    amount_minor: i64,
    currency: &str,
    user_id: &str,
) -> Result<PaymentIntent, BoxError> {
    let amount = amount_minor.to_string();
    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post("https://api.stripe.com/v1/payment_intents")
        .basic_auth(secret_key, None::<&str>)
        .form(&[
            ("amount", amount.as_str()),
            ("currency", currency),
            ("metadata[user_id]", user_id),
        ])
        .send()
        .await?
        .json()
        .await?;

    let id = resp["id"].as_str().map(String::from);
    let client_secret = resp["client_secret"].as_str().map(String::from);

    match (id, client_secret) {
        (Some(id), Some(client_secret)) => Ok(PaymentIntent { id, client_secret }),
        _ => Err(format!("Stripe create_payment_intent failed: {resp}").into()),
    }
}

/// Fetch the current status of a PaymentIntent ("succeeded", "processing", ...)
pub async fn retrieve_payment_intent_status(
    secret_key: &str,
    payment_intent_id: &str,
) -> Result<String, BoxError> {
    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .get(format!(
            "https://api.stripe.com/v1/payment_intents/{payment_intent_id}"
        ))
        .basic_auth(secret_key, None::<&str>)
        .send()
        .await?
        .json()
        .await?;

    resp["status"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("Stripe retrieve_payment_intent failed: {resp}").into())
}

/// Cancel a PaymentIntent. Best-effort cleanup when order persistence fails
/// after the intent was already created.
pub async fn cancel_payment_intent(
    secret_key: &str,
    payment_intent_id: &str,
) -> Result<(), BoxError> {
    let client = reqwest::Client::new();
    client
        .post(format!(
            "https://api.stripe.com/v1/payment_intents/{payment_intent_id}/cancel"
        ))
        .basic_auth(secret_key, None::<&str>)
        .send()
        .await?;
    Ok(())
}
