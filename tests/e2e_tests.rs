//! End-to-end integration tests
//!
//! These tests play the orchestrator against the built-in participants. Each
//! stage request goes over an in-memory connection to a [`ServiceHost`], and
//! the response is merged back into the payment the way the orchestrator
//! would. Scenarios cover:
//! - A full payment through every stage with a surcharge applied
//! - A split payment partly settled by a gift card
//! - Declines and cancellations
//! - Several requests over one keep-alive connection
//! - Newline-delimited input read from a file

#[cfg(test)]
mod tests {
    use appflow_core::cli::ParticipantKind;
    use appflow_core::core::{PreFlowModel, SplitModel};
    use appflow_core::io::{
        duplex, framed_connection, AppMessage, InternalData, MessageType, API_VERSION,
    };
    use appflow_core::participant::{create_participant, ParticipantSettings};
    use appflow_core::service::{
        FlowServiceDispatcher, PaymentFlowService, ServiceConfig, ServiceHost, ServiceLifecycle,
    };
    use appflow_core::types::{
        AppFlowError, Amounts, CardResponse, CardResult, FlowResponse, FlowStage,
        JsonConvertible, Payment, PaymentOutcome, PaymentResponseBuilder, SplitRequest,
        Transaction, TransactionOutcome, TransactionRequest, TransactionResponse,
        TransactionSummary, SALE,
    };
    use async_trait::async_trait;
    use rstest::rstest;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use tokio::io::AsyncReadExt;

    fn host(kind: ParticipantKind, settings: ParticipantSettings) -> ServiceHost {
        host_for(create_participant(kind, settings), ServiceConfig::default())
    }

    fn host_for(service: Arc<dyn PaymentFlowService>, config: ServiceConfig) -> ServiceHost {
        ServiceHost::new(Arc::new(FlowServiceDispatcher::new(service)), config)
    }

    /// Send one stage request to `host` and return every message it emitted
    ///
    /// The first message is always the acknowledgement.
    async fn call_stage(host: &ServiceHost, stage: FlowStage, data: &str) -> Vec<AppMessage> {
        let (connection, mut client) = duplex("orchestrator");
        client.send_request(stage, data).unwrap();
        host.serve_connection(connection).await.unwrap();
        let messages = client.collect_stream().await;
        assert_eq!(messages[0].message_type(), &MessageType::RequestAck);
        messages
    }

    /// Data of the single terminal response
    async fn response_data(host: &ServiceHost, stage: FlowStage, data: &str) -> String {
        let messages = call_stage(host, stage, data).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].message_type(), &MessageType::Response);
        messages[1].message_data().to_string()
    }

    fn payment(base: i64) -> Payment {
        Payment::builder()
            .with_transaction_type(SALE)
            .with_amounts(Amounts::new(base, "USD").unwrap())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_payment_with_surcharge() {
        let passthrough = host(ParticipantKind::Passthrough, ParticipantSettings::default());
        let surcharge = host(ParticipantKind::Surcharge, ParticipantSettings::default());
        let payment_service = host(
            ParticipantKind::SimulatedPayment,
            ParticipantSettings::default(),
        );
        let payment = payment(1000);

        // PRE_FLOW leaves the payment untouched
        let data = response_data(
            &passthrough,
            FlowStage::PreFlow,
            &payment.to_json().unwrap(),
        )
        .await;
        assert_eq!(data, "{}");

        // PRE_TRANSACTION adds a 5% surcharge
        let mut transaction = Transaction::new(payment.amounts().clone());
        let request =
            TransactionRequest::for_transaction(&payment, &transaction, FlowStage::PreTransaction);
        let data = response_data(
            &surcharge,
            FlowStage::PreTransaction,
            &request.to_json().unwrap(),
        )
        .await;
        assert!(data.contains(r#""additionalAmounts":{"surcharge":50}"#));
        FlowResponse::from_json(&data)
            .unwrap()
            .apply_to_transaction(&mut transaction, "com.surcharge", FlowStage::PreTransaction)
            .unwrap();
        assert_eq!(transaction.requested_amounts().total_amount_value(), 1050);

        // CARD_READING presents the test card
        let request =
            TransactionRequest::for_transaction(&payment, &transaction, FlowStage::CardReading);
        let data = response_data(
            &payment_service,
            FlowStage::CardReading,
            &request.to_json().unwrap(),
        )
        .await;
        let card_response = CardResponse::from_json(&data).unwrap();
        assert_eq!(card_response.result, CardResult::Approved);

        // TRANSACTION_PROCESSING approves the surcharged total
        let mut request = TransactionRequest::for_transaction(
            &payment,
            &transaction,
            FlowStage::TransactionProcessing,
        );
        request.card = card_response.card;
        let data = response_data(
            &payment_service,
            FlowStage::TransactionProcessing,
            &request.to_json().unwrap(),
        )
        .await;
        let transaction_response = TransactionResponse::from_json(&data).unwrap();
        assert_eq!(transaction_response.outcome(), TransactionOutcome::Approved);
        assert!(transaction_response.card().is_some());
        transaction.add_transaction_response(transaction_response);
        assert!(transaction.has_processed_requested_amounts());

        // POST_TRANSACTION and POST_FLOW complete without changes
        let summary = TransactionSummary::new(
            TransactionRequest::for_transaction(&payment, &transaction, FlowStage::PostTransaction),
            &transaction,
        );
        let data = response_data(
            &passthrough,
            FlowStage::PostTransaction,
            &summary.to_json().unwrap(),
        )
        .await;
        assert_eq!(data, "{}");

        let payment_response = PaymentResponseBuilder::new(payment)
            .add_transaction(transaction)
            .build()
            .unwrap();
        let processed = payment_response.total_amounts_processed();
        assert_eq!(processed.total_amount_value(), 1050);
        let data = response_data(
            &passthrough,
            FlowStage::PostFlow,
            &payment_response.to_json().unwrap(),
        )
        .await;
        assert_eq!(data, "{}");
    }

    struct GiftCardSplit {
        balance: i64,
    }

    #[async_trait]
    impl PaymentFlowService for GiftCardSplit {
        async fn split(&self, mut model: SplitModel) -> Result<(), AppFlowError> {
            if !model.split_request().is_first_split() {
                return model.skip();
            }
            let remaining = model.remaining_amounts().clone();
            let paid = self.balance.min(remaining.base_amount_value());
            model.set_amounts_paid(Amounts::new(paid, remaining.currency())?, "giftcard")?;
            model.send_response()
        }
    }

    #[tokio::test]
    async fn test_split_payment_settled_by_gift_card_and_card() {
        let giftcard = host_for(
            Arc::new(GiftCardSplit { balance: 400 }),
            ServiceConfig::default(),
        );
        let payment_service = host(
            ParticipantKind::SimulatedPayment,
            ParticipantSettings::default(),
        );
        let payment = payment(1000);

        // First round: the gift card covers 400 of 1000
        let request = SplitRequest::new(payment.clone(), vec![]);
        let data = response_data(&giftcard, FlowStage::Split, &request.to_json().unwrap()).await;
        let mut first = Transaction::new(request.remaining_amounts());
        FlowResponse::from_json(&data)
            .unwrap()
            .apply_to_transaction(&mut first, "com.giftcard", FlowStage::Split)
            .unwrap();
        assert_eq!(first.remaining_amounts().base_amount_value(), 600);

        // The card pays the remainder of that transaction
        let processing =
            TransactionRequest::for_transaction(&payment, &first, FlowStage::TransactionProcessing);
        let data = response_data(
            &payment_service,
            FlowStage::TransactionProcessing,
            &processing.to_json().unwrap(),
        )
        .await;
        first.add_transaction_response(TransactionResponse::from_json(&data).unwrap());
        assert!(first.has_processed_requested_amounts());

        // Second round sees nothing remaining and skips
        let request = SplitRequest::new(payment.clone(), vec![first.clone()]);
        assert_eq!(request.remaining_amounts().total_amount_value(), 0);
        let data = response_data(&giftcard, FlowStage::Split, &request.to_json().unwrap()).await;
        assert_eq!(data, "{}");

        let response = PaymentResponseBuilder::new(payment)
            .add_transaction(first)
            .build()
            .unwrap();
        assert_eq!(response.outcome(), PaymentOutcome::Fulfilled);
        assert_eq!(
            response.transactions()[0].transaction_responses()[0].payment_method(),
            "giftcard"
        );
    }

    #[rstest]
    #[case::approved(4000, PaymentOutcome::Fulfilled)]
    #[case::declined(6000, PaymentOutcome::Failed)]
    #[tokio::test]
    async fn test_decline_limit(#[case] base: i64, #[case] expected: PaymentOutcome) {
        let settings = ParticipantSettings {
            decline_above: Some(5000),
            ..ParticipantSettings::default()
        };
        let payment_service = host(ParticipantKind::SimulatedPayment, settings);
        let payment = payment(base);
        let mut transaction = Transaction::new(payment.amounts().clone());

        let request = TransactionRequest::for_transaction(
            &payment,
            &transaction,
            FlowStage::TransactionProcessing,
        );
        let data = response_data(
            &payment_service,
            FlowStage::TransactionProcessing,
            &request.to_json().unwrap(),
        )
        .await;
        transaction.add_transaction_response(TransactionResponse::from_json(&data).unwrap());

        let response = PaymentResponseBuilder::new(payment)
            .add_transaction(transaction)
            .build()
            .unwrap();
        assert_eq!(response.outcome(), expected);
    }

    struct Cancelling;

    #[async_trait]
    impl PaymentFlowService for Cancelling {
        async fn pre_flow(&self, mut model: PreFlowModel) -> Result<(), AppFlowError> {
            model.set_additional_amount("charity", 100);
            model.cancel_flow()
        }
    }

    #[tokio::test]
    async fn test_cancel_discards_changes() {
        let host = host_for(Arc::new(Cancelling), ServiceConfig::default());

        let data = response_data(
            &host,
            FlowStage::PreFlow,
            &payment(1000).to_json().unwrap(),
        )
        .await;

        let response = FlowResponse::from_json(&data).unwrap();
        assert!(response.cancel_transaction);
        assert!(response.updated_request_amounts.is_none());
    }

    #[tokio::test]
    async fn test_keep_alive_serves_several_streams() {
        let config = ServiceConfig {
            lifecycle: ServiceLifecycle::KeepAlive,
            ..ServiceConfig::default()
        };
        let host = host_for(
            create_participant(ParticipantKind::Surcharge, ParticipantSettings::default()),
            config,
        );
        let (connection, mut client) = duplex("orchestrator");

        for base in [1000, 2000, 3000] {
            let payment = payment(base);
            let transaction = Transaction::new(payment.amounts().clone());
            let stage = FlowStage::PreTransaction;
            let request = TransactionRequest::for_transaction(&payment, &transaction, stage);
            client
                .send_request(FlowStage::PreTransaction, &request.to_json().unwrap())
                .unwrap();
        }
        client.close().unwrap();

        let completed = host.serve_connection(connection).await.unwrap();
        assert_eq!(completed, 3);

        for base in [1000, 2000, 3000] {
            let messages = client.collect_stream().await;
            let response = FlowResponse::from_json(messages[1].message_data()).unwrap();
            let amounts = response.updated_request_amounts.unwrap();
            assert_eq!(amounts.additional_amount_value("surcharge"), base / 20);
        }
    }

    #[tokio::test]
    async fn test_requests_from_file() {
        let payment = payment(1000);
        let transaction = Transaction::new(payment.amounts().clone());
        let request =
            TransactionRequest::for_transaction(&payment, &transaction, FlowStage::PreTransaction);
        let internal = InternalData::new(API_VERSION, Some("orchestrator"))
            .with_stage(FlowStage::PreTransaction);
        let line = AppMessage::request(&request.to_json().unwrap())
            .with_internal_data(&internal)
            .unwrap()
            .to_json()
            .unwrap();

        let mut input = NamedTempFile::new().unwrap();
        writeln!(input, "{line}").unwrap();
        writeln!(input).unwrap();
        let file = tokio::fs::File::open(input.path()).await.unwrap();
        let (output_writer, mut output_reader) = tokio::io::duplex(64 * 1024);

        let (connection, tasks) = framed_connection(file, output_writer);
        let host = host(ParticipantKind::Surcharge, ParticipantSettings::default());
        let completed = host.serve_connection(connection).await.unwrap();
        tasks.finish().await;

        let mut output = String::new();
        output_reader.read_to_string(&mut output).await.unwrap();
        let messages: Vec<AppMessage> = output
            .lines()
            .map(|line| AppMessage::from_json(line).unwrap())
            .collect();
        assert_eq!(completed, 1);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message_type(), &MessageType::RequestAck);
        assert!(messages[1]
            .message_data()
            .contains(r#""additionalAmounts":{"surcharge":50}"#));
    }
}
