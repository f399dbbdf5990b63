//! Wire form of bus messages and an end-to-end lookup through the registry.

use std::sync::Arc;

use palisade_action_model::test_helpers::RecordingAdder;
use palisade_action_model::{Catalog, LockingActionModel};
use palisade_config::PalisadeConfig;
use palisade_fetch::{BusMessage, ChannelBus, ExecutorQuery, ExecutorReply, FetchRequest, FetchResponse, TypeFetcher};
use palisade_types::{Declaration, TypeName};
use pretty_assertions::assert_eq;
use serde_json::json;

fn tn(s: &str) -> TypeName {
	s.parse().unwrap()
}

#[test]
fn messages_serialize_as_flat_json() {
	let request = FetchRequest { id: 7, name: tn("ns:Thing@2") };
	assert_eq!(serde_json::to_value(&request).unwrap(), json!({ "id": 7, "name": "ns:Thing@2" }));

	let miss = FetchResponse::not_found(7);
	assert_eq!(serde_json::to_value(&miss).unwrap(), json!({ "id": 7 }));
	let parsed: FetchResponse = serde_json::from_value(json!({ "id": 7 })).unwrap();
	assert_eq!(parsed, miss);

	let query = ExecutorQuery { id: 9, action: tn("ns:Run") };
	assert_eq!(serde_json::to_value(&query).unwrap(), json!({ "id": 9, "action": "ns:Run" }));

	let reply: ExecutorReply = serde_json::from_value(json!({ "id": 9, "executor": "node-a", "available": true })).unwrap();
	assert!(reply.available);
	assert_eq!(reply.executor, "node-a");
}

#[test]
fn malformed_names_are_rejected_on_the_wire() {
	let err = serde_json::from_value::<FetchRequest>(json!({ "id": 1, "name": "no namespace" }));
	assert!(err.is_err());
}

#[tokio::test]
async fn fetched_declarations_can_be_registered() {
	let _ = tracing_subscriber::fmt::try_init();
	let config = PalisadeConfig::default();

	// The remote side knows an action whose input type is only in the local catalog.
	let remote = Declaration::action(tn("ns:Deploy")).with_input("target", tn("ns:Host"));
	let catalog: Catalog = [Declaration::type_decl(tn("ns:Host"))].into_iter().collect();
	let model = LockingActionModel::builder(Arc::new(RecordingAdder::new()))
		.source(Arc::new(catalog))
		.config(&config)
		.build()
		.unwrap();

	let (bus, responder) = ChannelBus::new();
	let answer = remote.clone();
	responder.serve(move |message| match message {
		BusMessage::Fetch { request, reply } => {
			let response = if request.name == *answer.name() {
				FetchResponse::found(request.id, answer.clone())
			} else {
				FetchResponse::not_found(request.id)
			};
			let _ = reply.send(response);
		}
		BusMessage::ExecutorQuery { query, replies } => {
			let _ = replies.send(ExecutorReply {
				id: query.id,
				executor: "node-a".to_owned(),
				available: query.action == *answer.name(),
			});
		}
	});

	let fetcher = TypeFetcher::new(Arc::clone(&model), Arc::new(bus), &config.fetch);
	let fetched = fetcher.fetch(&tn("ns:Deploy")).await.unwrap().unwrap();
	assert_eq!(*fetched, remote);
	assert!(fetcher.executors_exist(&tn("ns:Deploy")).await.unwrap());
	assert!(!fetcher.executors_exist(&tn("ns:Host")).await.unwrap());

	model.add(&fetched).unwrap();
	assert_eq!(model.known_names(), vec![tn("ns:Deploy"), tn("ns:Host")]);

	// Now served from the registry even after the cache is emptied.
	fetcher.clear();
	let again = fetcher.fetch(&tn("ns:Deploy")).await.unwrap();
	assert_eq!(again.as_deref(), Some(&remote));
}
