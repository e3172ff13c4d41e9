mod common;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::init_tracing();

    let client = common::client_from_env()?;
    let recipient = common::recipient_from_env()?;
    let content = std::env::var("WECOM_MESSAGE")
        .unwrap_or_else(|_| "Hello from the wecom-push demo.".to_owned());

    let outcome = client.send_text(recipient, content).await?;
    println!(
        "errcode: {:?}, errmsg: {:?}, msgid: {:?}",
        outcome.errcode, outcome.errmsg, outcome.msgid
    );

    Ok(())
}
