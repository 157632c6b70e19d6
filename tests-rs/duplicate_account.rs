use counter_client::{instruction, CounterAccount, CounterError};
use solana_sdk::signature::{Keypair, Signer};
use tokio_util::sync::CancellationToken;

mod utils;

#[tokio::test]
async fn existing_address_is_refused_before_sending() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let cancel = CancellationToken::new();
    let counter = Keypair::new();

    client
        .create_and_increment(&context.payer, &counter, &cancel)
        .await
        .unwrap();

    let err = client
        .create_and_increment(&context.payer, &counter, &cancel)
        .await
        .unwrap_err();
    assert!(
        matches!(err, CounterError::AccountAlreadyExists(address) if address == counter.pubkey())
    );
    assert_eq!(client.fetch_counter(&counter.pubkey()).await.unwrap(), 1);
}

#[tokio::test]
async fn cluster_rejects_second_allocation() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let cancel = CancellationToken::new();
    let counter = Keypair::new();

    client
        .create_and_increment(&context.payer, &counter, &cancel)
        .await
        .unwrap();

    // Skip the local existence check and let the system program refuse it.
    // A different balance keeps the transaction distinct from the first one.
    let rent = context.banks_client.get_rent().await.unwrap();
    let request = instruction::build(
        &context.payer.pubkey(),
        &counter.pubkey(),
        &utils::PROGRAM,
        rent.minimum_balance(CounterAccount::size_of()) + 1,
    );
    let err = client
        .submit(&request, &[&context.payer, &counter], &cancel)
        .await
        .unwrap_err();

    assert!(
        matches!(err, CounterError::AccountAlreadyExists(address) if address == counter.pubkey())
    );
    // Neither instruction applied
    assert_eq!(client.fetch_counter(&counter.pubkey()).await.unwrap(), 1);
}
