mod common;

use wecom_push::TextCard;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::init_tracing();

    let client = common::client_from_env()?;
    let recipient = common::recipient_from_env()?;

    let mut card = TextCard::new("Good morning!", "Sunny today, a fine day to go out.")?;
    if let Ok(url) = std::env::var("WECOM_CARD_URL") {
        card = card.url(url);
    }

    let outcome = client.send_text_card(recipient, card).await?;
    if outcome.is_ok() {
        println!("card sent");
    } else {
        eprintln!("card rejected: {:?} {:?}", outcome.errcode, outcome.errmsg);
    }

    Ok(())
}
