use std::time::Duration;

use counter_client::{instruction, CounterError, SubmissionFailure};
use solana_sdk::signature::{Keypair, Signer};
use tokio_util::sync::CancellationToken;

mod utils;

#[tokio::test]
async fn timed_out_submission_can_be_retried_with_fresh_identity() {
    let context = utils::start().await;
    let mut config = utils::config();
    config.confirm_timeout = Duration::from_millis(200);
    let client = utils::client(&context, config);
    let cancel = CancellationToken::new();

    let lost = Keypair::new();
    client.rpc().drop_next_sends(1);
    let err = client
        .create_and_increment(&context.payer, &lost, &cancel)
        .await
        .unwrap_err();
    match err {
        CounterError::Timeout { waited, .. } => assert_eq!(waited, Duration::from_millis(200)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(matches!(
        client.fetch_account(&lost.pubkey()).await,
        Err(CounterError::AccountNotFound(_))
    ));

    let retry = Keypair::new();
    let count = client
        .create_and_increment(&context.payer, &retry, &cancel)
        .await
        .unwrap();
    assert_eq!(count, 1);

    // Observing again changes nothing
    assert_eq!(client.fetch_counter(&retry.pubkey()).await.unwrap(), 1);
    assert_eq!(client.fetch_counter(&retry.pubkey()).await.unwrap(), 1);
    assert!(matches!(
        client.fetch_counter(&lost.pubkey()).await,
        Err(CounterError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn cancelled_token_leaves_the_ledger_untouched() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let counter = Keypair::new();
    let balance_before = client.balance(&context.payer.pubkey()).await.unwrap();

    let err = client
        .create_and_increment(&context.payer, &counter, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, CounterError::Cancelled { .. }));
    assert!(matches!(
        client.fetch_account(&counter.pubkey()).await,
        Err(CounterError::AccountNotFound(_))
    ));
    // No fee was charged, so nothing reached the bank
    assert_eq!(
        client.balance(&context.payer.pubkey()).await.unwrap(),
        balance_before
    );
}

#[tokio::test]
async fn missing_signer_is_a_submission_error() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let counter = Keypair::new();

    let request = instruction::build(
        &context.payer.pubkey(),
        &counter.pubkey(),
        &utils::PROGRAM,
        1_000_000,
    );
    let err = client
        .submit(&request, &[&context.payer], &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CounterError::Submission(SubmissionFailure::Signing(_))
    ));
    assert!(client.fetch_account(&counter.pubkey()).await.is_err());
}

#[tokio::test]
async fn unfunded_payer_is_rejected() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let payer = Keypair::new();
    let counter = Keypair::new();

    let err = client
        .create_and_increment(&payer, &counter, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CounterError::Submission(SubmissionFailure::Rejected(_))
    ));
    assert!(matches!(
        client.fetch_account(&counter.pubkey()).await,
        Err(CounterError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn increment_of_unallocated_counter_fails() {
    let context = utils::start().await;
    let client = utils::client(&context, utils::config());
    let counter = Keypair::new();

    // Without an allocation in front, the program sees an account it does not own
    let err = client
        .increment(&context.payer, &counter.pubkey(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CounterError::Submission(SubmissionFailure::Rejected(_))
    ));
}
