mod common;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::init_tracing();

    let client = common::client_from_env()?;
    let recipient = common::recipient_from_env()?;
    let path = common::required_env("WECOM_FILE")?;

    let outcome = client.send_file(recipient, &path).await?.into_result()?;
    println!("file sent, msgid: {:?}", outcome.msgid);

    Ok(())
}
