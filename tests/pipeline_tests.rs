use bank_events::domain::{
    CloseAccountCommand, DepositFundCommand, DepositFundEvent, OpenAccountCommand,
    WithdrawFundCommand,
};
use bank_events::{
    AccountCommandService, AccountEvent, AccountEventHandler, AccountStore, EventHandler,
    EventKind, HandleOutcome, InMemoryAccountStore, InMemoryEventLog,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

struct Pipeline {
    service: AccountCommandService,
    log: InMemoryEventLog,
    handler: AccountEventHandler,
    store: InMemoryAccountStore,
}

impl Pipeline {
    fn new() -> Self {
        let log = InMemoryEventLog::new();
        let store = InMemoryAccountStore::new();
        Self {
            service: AccountCommandService::new(Arc::new(log.clone())),
            handler: AccountEventHandler::new(Arc::new(store.clone())),
            log,
            store,
        }
    }

    async fn project(&self) -> Vec<HandleOutcome> {
        self.log.deliver_to(&self.handler).await
    }

    async fn open(&self, holder: &str, account_type: i32, balance: Decimal) -> String {
        self.service
            .open_account(OpenAccountCommand {
                account_holder: holder.to_string(),
                account_type,
                opening_balance: balance,
            })
            .await
            .expect("open account")
    }

    async fn balance(&self, id: &str) -> Decimal {
        self.store
            .find_by_id(id)
            .await
            .unwrap()
            .expect("account exists")
            .balance
    }
}

#[tokio::test]
async fn opened_account_is_not_visible_until_projected() {
    let pipeline = Pipeline::new();
    let id = pipeline.open("alice", 1, dec!(1000)).await;

    assert!(pipeline.store.find_by_id(&id).await.unwrap().is_none());
    assert_eq!(pipeline.log.len(), 1);

    pipeline.project().await;
    assert!(pipeline.store.find_by_id(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn open_account_round_trips_through_the_log() {
    let pipeline = Pipeline::new();
    let id = pipeline.open("alice", 7, dec!(1234.56)).await;

    let record = pipeline.log.records().remove(0);
    assert_eq!(record.topic, "OpenAccountEvent");
    assert_eq!(record.key, id);
    let published = AccountEvent::from_payload(EventKind::OpenAccount, &record.payload).unwrap();

    assert_eq!(
        pipeline.project().await,
        [HandleOutcome::Applied(EventKind::OpenAccount)]
    );

    let AccountEvent::OpenAccount(event) = published else {
        panic!("expected an open account event");
    };
    let stored = pipeline.store.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.id, event.id);
    assert_eq!(stored.account_holder, event.account_holder);
    assert_eq!(stored.account_type, event.account_type);
    assert_eq!(stored.balance, event.opening_balance);
}

#[tokio::test]
async fn account_lifecycle_scenarios() {
    let pipeline = Pipeline::new();

    // Open alice with 1000.
    let id = pipeline.open("alice", 1, dec!(1000)).await;
    pipeline.project().await;
    let stored = pipeline.store.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.account_holder, "alice");
    assert_eq!(stored.account_type, 1);
    assert_eq!(stored.balance, dec!(1000));

    // Deposit 250.
    pipeline
        .service
        .deposit_fund(DepositFundCommand {
            id: id.clone(),
            amount: dec!(250),
        })
        .await
        .unwrap();
    pipeline.project().await;
    assert_eq!(pipeline.balance(&id).await, dec!(1250));

    // Withdraw 2000: no floor at zero.
    pipeline
        .service
        .withdraw_fund(WithdrawFundCommand {
            id: id.clone(),
            amount: dec!(2000),
        })
        .await
        .unwrap();
    pipeline.project().await;
    assert_eq!(pipeline.balance(&id).await, dec!(-750));

    // Close removes the account.
    pipeline
        .service
        .close_account(CloseAccountCommand { id: id.clone() })
        .await
        .unwrap();
    assert_eq!(
        pipeline.project().await,
        [HandleOutcome::Applied(EventKind::CloseAccount)]
    );
    assert!(pipeline.store.find_by_id(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn deposit_to_unknown_account_changes_nothing() {
    let pipeline = Pipeline::new();
    let id = pipeline.open("alice", 1, dec!(1000)).await;
    pipeline.project().await;
    let before = pipeline.store.find_all().await.unwrap();

    // The command side cannot know the account is missing.
    pipeline
        .service
        .deposit_fund(DepositFundCommand {
            id: "ghost".to_string(),
            amount: dec!(100),
        })
        .await
        .unwrap();

    let outcomes = pipeline.project().await;
    assert!(matches!(
        outcomes.as_slice(),
        [HandleOutcome::Skipped {
            kind: EventKind::DepositFund,
            ..
        }]
    ));
    assert!(pipeline.store.find_by_id("ghost").await.unwrap().is_none());
    assert_eq!(pipeline.store.find_all().await.unwrap(), before);
    assert_eq!(pipeline.balance(&id).await, dec!(1000));
}

#[tokio::test]
async fn redelivered_deposit_is_applied_twice() {
    let pipeline = Pipeline::new();
    let id = pipeline.open("alice", 1, dec!(1000)).await;
    pipeline.project().await;

    let event = AccountEvent::from(DepositFundEvent {
        id: id.clone(),
        amount: dec!(250),
    });
    let payload = event.to_payload().unwrap();

    // At-least-once delivery without deduplication.
    for _ in 0..2 {
        assert_eq!(
            pipeline.handler.handle(event.topic(), &payload).await,
            HandleOutcome::Applied(EventKind::DepositFund)
        );
    }
    assert_eq!(pipeline.balance(&id).await, dec!(1500));
}

#[tokio::test]
async fn redelivered_open_does_not_reset_balance() {
    let pipeline = Pipeline::new();
    let id = pipeline.open("alice", 1, dec!(1000)).await;
    let open_record = pipeline.log.records().remove(0);
    pipeline.project().await;

    pipeline
        .service
        .deposit_fund(DepositFundCommand {
            id: id.clone(),
            amount: dec!(500),
        })
        .await
        .unwrap();
    pipeline.project().await;

    let outcome = pipeline
        .handler
        .handle(&open_record.topic, &open_record.payload)
        .await;
    assert!(matches!(
        outcome,
        HandleOutcome::Skipped {
            kind: EventKind::OpenAccount,
            ..
        }
    ));
    assert_eq!(pipeline.balance(&id).await, dec!(1500));
}

#[tokio::test]
async fn many_small_movements_keep_exact_balance() {
    let pipeline = Pipeline::new();
    let id = pipeline.open("alice", 1, dec!(0.10)).await;

    for _ in 0..1000 {
        pipeline
            .service
            .deposit_fund(DepositFundCommand {
                id: id.clone(),
                amount: dec!(0.10),
            })
            .await
            .unwrap();
    }
    for _ in 0..500 {
        pipeline
            .service
            .withdraw_fund(WithdrawFundCommand {
                id: id.clone(),
                amount: dec!(0.20),
            })
            .await
            .unwrap();
    }
    pipeline.project().await;

    assert_eq!(pipeline.balance(&id).await, dec!(0.10));
}

#[tokio::test]
async fn rejected_commands_publish_nothing() {
    let pipeline = Pipeline::new();

    assert!(pipeline
        .service
        .open_account(OpenAccountCommand {
            account_holder: String::new(),
            account_type: 1,
            opening_balance: dec!(1),
        })
        .await
        .is_err());
    assert!(pipeline
        .service
        .withdraw_fund(WithdrawFundCommand {
            id: "id1".to_string(),
            amount: Decimal::ZERO,
        })
        .await
        .is_err());
    assert!(pipeline
        .service
        .close_account(CloseAccountCommand { id: String::new() })
        .await
        .is_err());

    assert!(pipeline.log.is_empty());
}

#[tokio::test]
async fn bad_messages_do_not_stop_the_stream() {
    let pipeline = Pipeline::new();
    let id = pipeline.open("alice", 1, dec!(10)).await;
    let open = pipeline.log.drain().remove(0);

    let outcomes = vec![
        pipeline.handler.handle("SomethingElse", b"{}").await,
        pipeline.handler.handle("OpenAccountEvent", b"").await,
        pipeline.handler.handle(&open.topic, &open.payload).await,
    ];

    assert_eq!(outcomes[0], HandleOutcome::UnknownTopic);
    assert!(matches!(outcomes[1], HandleOutcome::Dropped { .. }));
    assert_eq!(outcomes[2], HandleOutcome::Applied(EventKind::OpenAccount));
    assert_eq!(pipeline.balance(&id).await, dec!(10));
}
