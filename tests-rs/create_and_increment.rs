use counter_client::{CounterAccount, CounterError};
use solana_sdk::signature::{Keypair, Signer};
use tokio_util::sync::CancellationToken;

mod utils;

#[tokio::test]
async fn fresh_counter_is_incremented_once() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let counter = Keypair::new();

    let count = client
        .create_and_increment(&context.payer, &counter, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(count, 1);

    let data = client.fetch_account(&counter.pubkey()).await.unwrap();
    assert_eq!(data.len(), CounterAccount::size_of());
    assert_eq!(CounterAccount::decode(&data).unwrap(), 1);

    let account = context
        .banks_client
        .get_account(counter.pubkey())
        .await
        .unwrap()
        .expect("counter account must exist");
    assert_eq!(account.owner, utils::PROGRAM);
    let rent = context.banks_client.get_rent().await.unwrap();
    assert!(rent.is_exempt(account.lamports, CounterAccount::size_of()));
}

#[tokio::test]
async fn existing_counter_can_be_incremented_again() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let cancel = CancellationToken::new();
    let counter = Keypair::new();

    client
        .create_and_increment(&context.payer, &counter, &cancel)
        .await
        .unwrap();
    let count = client
        .increment(&context.payer, &counter.pubkey(), &cancel)
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(client.fetch_counter(&counter.pubkey()).await.unwrap(), 2);
}

#[tokio::test]
async fn independent_workflows_run_concurrently() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let cancel = CancellationToken::new();
    let first = Keypair::new();
    let second = Keypair::new();

    let (a, b) = tokio::join!(
        client.create_and_increment(&context.payer, &first, &cancel),
        client.create_and_increment(&context.payer, &second, &cancel),
    );

    assert_eq!(a.unwrap(), 1);
    assert_eq!(b.unwrap(), 1);
}

#[tokio::test]
async fn missing_account_is_not_found() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let address = Keypair::new().pubkey();

    assert!(matches!(
        client.fetch_account(&address).await,
        Err(CounterError::AccountNotFound(missing)) if missing == address
    ));
    assert!(matches!(
        client.fetch_counter(&address).await,
        Err(CounterError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn accounts_of_other_owners_are_not_counters() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let payer = context.payer.pubkey();

    // The payer is a system account holding no data
    assert_eq!(client.fetch_account(&payer).await.unwrap().len(), 0);
    assert!(matches!(
        client.fetch_counter(&payer).await,
        Err(CounterError::IncorrectOwner { address, .. }) if address == payer
    ));
    assert!(client.balance(&payer).await.unwrap() > 0);
}
