use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use palisade_action_model::LockingActionModel;
use palisade_action_model::test_helpers::RecordingAdder;
use palisade_config::FetchConfig;
use palisade_types::{Declaration, TypeName};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::oneshot;

use super::TypeFetcher;
use crate::{BusMessage, ChannelBus, ExecutorReply, FetchError, FetchResponse, Responder};

fn tn(s: &str) -> TypeName {
	s.parse().unwrap()
}

fn model() -> Arc<LockingActionModel> {
	LockingActionModel::builder(Arc::new(RecordingAdder::new())).build().unwrap()
}

fn config() -> FetchConfig {
	FetchConfig {
		request_timeout_ms: 100,
		executor_window_ms: 50,
		cache_capacity: 8,
		cache_ttl_ms: 1_000,
	}
}

/// Answers fetches from `known` and counts them. Executor queries get no replies.
fn serve_catalog(responder: Responder, known: Vec<Declaration>) -> Arc<AtomicUsize> {
	let hits = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&hits);
	responder.serve(move |message| {
		if let BusMessage::Fetch { request, reply } = message {
			counter.fetch_add(1, Ordering::SeqCst);
			let response = match known.iter().find(|d| d.name() == &request.name) {
				Some(decl) => FetchResponse::found(request.id, decl.clone()),
				None => FetchResponse::not_found(request.id),
			};
			let _ = reply.send(response);
		}
	});
	hits
}

fn fetcher_with(known: Vec<Declaration>) -> (TypeFetcher, Arc<AtomicUsize>) {
	let (bus, responder) = ChannelBus::new();
	let hits = serve_catalog(responder, known);
	(TypeFetcher::new(model(), Arc::new(bus), &config()), hits)
}

#[tokio::test]
async fn registered_names_never_touch_the_bus() {
	let model = model();
	let decl = Declaration::type_decl(tn("ns:Local"));
	model.add(&decl).unwrap();
	let (bus, responder) = ChannelBus::new();
	drop(responder);

	let fetcher = TypeFetcher::new(model, Arc::new(bus), &config());
	let found = fetcher.fetch(&tn("ns:Local")).await.unwrap();
	assert_eq!(found.as_deref(), Some(&decl));
}

#[tokio::test]
async fn remote_hits_are_cached() {
	let remote = Declaration::type_decl(tn("ns:Remote"));
	let (fetcher, hits) = fetcher_with(vec![remote.clone()]);

	for _ in 0..3 {
		let found = fetcher.fetch(&tn("ns:Remote")).await.unwrap();
		assert_eq!(found.as_deref(), Some(&remote));
	}
	assert_eq!(hits.load(Ordering::SeqCst), 1);
	assert_eq!(fetcher.cached_len(), 1);
}

#[tokio::test]
async fn misses_are_not_cached() {
	let (fetcher, hits) = fetcher_with(Vec::new());

	assert_eq!(fetcher.fetch(&tn("ns:Nowhere")).await.unwrap(), None);
	assert_eq!(fetcher.fetch(&tn("ns:Nowhere")).await.unwrap(), None);
	assert_eq!(hits.load(Ordering::SeqCst), 2);
	assert_eq!(fetcher.cached_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn cached_entries_expire() {
	let (fetcher, hits) = fetcher_with(vec![Declaration::type_decl(tn("ns:Remote"))]);

	fetcher.fetch(&tn("ns:Remote")).await.unwrap();
	tokio::time::advance(Duration::from_millis(999)).await;
	fetcher.fetch(&tn("ns:Remote")).await.unwrap();
	assert_eq!(hits.load(Ordering::SeqCst), 1);

	tokio::time::advance(Duration::from_millis(2)).await;
	fetcher.fetch(&tn("ns:Remote")).await.unwrap();
	assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidate_and_clear_force_a_refetch() {
	let (fetcher, hits) = fetcher_with(vec![Declaration::type_decl(tn("ns:A")), Declaration::type_decl(tn("ns:B"))]);

	fetcher.fetch(&tn("ns:A")).await.unwrap();
	fetcher.fetch(&tn("ns:B")).await.unwrap();
	assert!(fetcher.invalidate(&tn("ns:A")));
	assert!(!fetcher.invalidate(&tn("ns:A")));
	fetcher.fetch(&tn("ns:A")).await.unwrap();
	assert_eq!(hits.load(Ordering::SeqCst), 3);

	fetcher.clear();
	assert_eq!(fetcher.cached_len(), 0);
	fetcher.fetch(&tn("ns:B")).await.unwrap();
	assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn silent_responder_times_out() {
	let (bus, responder) = ChannelBus::new();
	let parked: Arc<Mutex<Vec<oneshot::Sender<FetchResponse>>>> = Arc::default();
	let keep = Arc::clone(&parked);
	responder.serve(move |message| {
		if let BusMessage::Fetch { reply, .. } = message {
			keep.lock().push(reply);
		}
	});

	let fetcher = TypeFetcher::new(model(), Arc::new(bus), &config());
	let err = fetcher.fetch(&tn("ns:Slow")).await.unwrap_err();
	assert_eq!(
		err,
		FetchError::Timeout {
			operation: "fetch",
			after: Duration::from_millis(100),
		}
	);
}

#[tokio::test]
async fn delivery_failures_are_bus_errors() {
	let (bus, responder) = ChannelBus::new();
	drop(responder);
	let fetcher = TypeFetcher::new(model(), Arc::new(bus), &config());
	assert!(matches!(fetcher.fetch(&tn("ns:X")).await, Err(FetchError::Bus(_))));

	let (bus, responder) = ChannelBus::new();
	responder.serve(drop);
	let fetcher = TypeFetcher::new(model(), Arc::new(bus), &config());
	assert!(matches!(fetcher.fetch(&tn("ns:X")).await, Err(FetchError::Bus(_))));
}

#[tokio::test]
async fn answers_for_another_name_are_rejected() {
	let (bus, responder) = ChannelBus::new();
	responder.serve(|message| {
		if let BusMessage::Fetch { request, reply } = message {
			let _ = reply.send(FetchResponse::found(request.id, Declaration::type_decl(tn("ns:Impostor"))));
		}
	});
	let fetcher = TypeFetcher::new(model(), Arc::new(bus), &config());

	let err = fetcher.fetch(&tn("ns:Wanted")).await.unwrap_err();
	assert_eq!(err, FetchError::Bus("asked for ns:Wanted, got ns:Impostor".to_owned()));
	assert_eq!(fetcher.cached_len(), 0);
}

fn serve_executors(responder: Responder, answers: Vec<bool>) {
	responder.serve(move |message| {
		if let BusMessage::ExecutorQuery { query, replies } = message {
			for (i, available) in answers.iter().enumerate() {
				let _ = replies.send(ExecutorReply {
					id: query.id,
					executor: format!("exec-{i}"),
					available: *available,
				});
			}
		}
	});
}

#[tokio::test]
async fn one_positive_reply_is_enough() {
	let (bus, responder) = ChannelBus::new();
	serve_executors(responder, vec![false, true, false]);
	let fetcher = TypeFetcher::new(model(), Arc::new(bus), &config());
	assert!(fetcher.executors_exist(&tn("ns:Run")).await.unwrap());
}

#[tokio::test]
async fn all_negative_replies_mean_no_executor() {
	let (bus, responder) = ChannelBus::new();
	serve_executors(responder, vec![false, false]);
	let fetcher = TypeFetcher::new(model(), Arc::new(bus), &config());
	assert!(!fetcher.executors_exist(&tn("ns:Run")).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn silence_until_the_window_closes_means_no_executor() {
	let (bus, responder) = ChannelBus::new();
	let parked = Arc::new(Mutex::new(Vec::new()));
	let keep = Arc::clone(&parked);
	responder.serve(move |message| {
		if let BusMessage::ExecutorQuery { query, replies } = message {
			// Stale id: must be ignored even though it says yes.
			let _ = replies.send(ExecutorReply {
				id: query.id + 1000,
				executor: "stale".to_owned(),
				available: true,
			});
			keep.lock().push(replies);
		}
	});
	let fetcher = TypeFetcher::new(model(), Arc::new(bus), &config());

	let started = tokio::time::Instant::now();
	assert!(!fetcher.executors_exist(&tn("ns:Run")).await.unwrap());
	assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn responder_can_answer_by_hand() {
	let (bus, mut responder) = ChannelBus::new();
	let fetcher = TypeFetcher::new(model(), Arc::new(bus), &config());
	let name = tn("ns:Manual");
	let wanted = Declaration::type_decl(name.clone());

	let answer = async {
		let Some(BusMessage::Fetch { request, reply }) = responder.recv().await else {
			panic!("expected a fetch request");
		};
		assert_eq!(request.name, name);
		reply.send(FetchResponse::found(request.id, wanted.clone())).unwrap();
	};
	let (found, ()) = tokio::join!(fetcher.fetch(&name), answer);
	assert_eq!(found.unwrap().as_deref(), Some(&wanted));
}
