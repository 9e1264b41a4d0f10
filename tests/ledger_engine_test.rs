//! Ledger engine scenarios driven through the public API

use flow_ledger::ledger::{
    invariants, AccountTokenSnapshot, AuditLog, EventMeta, Index, LedgerStore, MemoryStore, Pool,
    PoolMember, ProtocolEvent, SequencedEvent, SqliteStore, Stream, Subscription, TokenStatistic,
};
use flow_ledger::{Address, LedgerEngine, LedgerError, Units};
use tempfile::TempDir;

const TOKEN: Address = Address::new([0x20; 20]);
const POOL: Address = Address::new([0x10; 20]);
const DISTRIBUTOR: Address = Address::new([0xd1; 20]);

fn account(n: u8) -> Address {
    Address::new([n; 20])
}

/// Events at increasing positions, one second apart unless told otherwise.
struct Timeline {
    block: u64,
    timestamp: u64,
}

impl Timeline {
    fn new() -> Self {
        Self {
            block: 100,
            timestamp: 1_650_000_000,
        }
    }

    fn next(&mut self, event: ProtocolEvent) -> SequencedEvent {
        self.after(1, event)
    }

    fn after(&mut self, seconds: u64, event: ProtocolEvent) -> SequencedEvent {
        self.block += 1;
        self.timestamp += seconds;
        SequencedEvent {
            meta: EventMeta::new(self.block, self.timestamp, 0),
            event,
        }
    }
}

fn memory_engine() -> LedgerEngine<MemoryStore, AuditLog> {
    LedgerEngine::new(MemoryStore::new(), AuditLog::new()).unwrap()
}

fn load<E: flow_ledger::ledger::Entity, S: LedgerStore>(store: &S, id: &str) -> E {
    store.load(id).unwrap().unwrap_or_else(|| panic!("missing entity {}", id))
}

fn ats<S: LedgerStore>(store: &S, who: Address) -> AccountTokenSnapshot {
    load(store, &AccountTokenSnapshot::id_for(&who, &TOKEN))
}

fn flow(sender: Address, receiver: Address, flow_rate: i128) -> ProtocolEvent {
    ProtocolEvent::FlowUpdated {
        token: TOKEN,
        sender,
        receiver,
        flow_rate,
    }
}

fn member_units(member: Address, old_units: Units, new_units: Units) -> ProtocolEvent {
    ProtocolEvent::MemberUnitsUpdated {
        pool: POOL,
        token: TOKEN,
        member,
        old_units,
        new_units,
    }
}

fn connect(member: Address, connected: bool) -> ProtocolEvent {
    ProtocolEvent::PoolConnectionUpdated {
        pool: POOL,
        token: TOKEN,
        account: member,
        connected,
    }
}

fn claim(member: Address) -> ProtocolEvent {
    ProtocolEvent::DistributionClaimed {
        pool: POOL,
        token: TOKEN,
        member,
        claimed_amount: 0,
        total_claimed: 0,
    }
}

#[test]
fn test_membership_counters_are_conserved() {
    let mut engine = memory_engine();
    let mut timeline = Timeline::new();
    let mut units = [0i128; 5];
    let mut connected = [false; 5];

    engine
        .apply(&timeline.next(ProtocolEvent::FlowDistributionUpdated {
            pool: POOL,
            token: TOKEN,
            distributor: DISTRIBUTOR,
            old_flow_rate: 0,
            new_distributor_to_pool_flow_rate: 1_000,
            new_total_distribution_flow_rate: 1_000,
            adjustment_flow_rate: 0,
        }))
        .unwrap();

    // deterministic pseudo-random walk over members, units and connections
    let mut seed: u64 = 0x5eed;
    for step in 0..200 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let who = (seed >> 33) as usize % 5;
        let member = account(who as u8 + 1);

        let event = if step % 7 == 3 {
            connected[who] = !connected[who];
            connect(member, connected[who])
        } else {
            let new_units = ((seed >> 40) % 4) as i128;
            let event = member_units(member, units[who], new_units);
            units[who] = new_units;
            event
        };
        engine.apply(&timeline.next(event)).unwrap();

        let pool: Pool = load(engine.store(), &POOL.to_string());
        assert_eq!(
            pool.total_members,
            pool.total_connected_members + pool.total_disconnected_members,
            "step {}",
            step
        );
        assert_eq!(
            pool.total_units,
            pool.total_connected_units + pool.total_disconnected_units,
            "step {}",
            step
        );
        assert_eq!(pool.total_units, units.iter().sum::<i128>(), "step {}", step);
        assert_eq!(
            pool.total_members,
            units.iter().filter(|u| **u > 0).count() as u64,
            "step {}",
            step
        );
    }

    assert!(invariants::check(engine.store()).unwrap().is_empty());
}

#[test]
fn test_members_receive_their_share_of_pool_flow() {
    let mut engine = memory_engine();
    let mut timeline = Timeline::new();
    let (alice, bob) = (account(1), account(2));

    engine.apply(&timeline.next(member_units(alice, 0, 1))).unwrap();
    engine.apply(&timeline.next(member_units(bob, 0, 3))).unwrap();
    engine
        .apply(&timeline.next(ProtocolEvent::FlowDistributionUpdated {
            pool: POOL,
            token: TOKEN,
            distributor: DISTRIBUTOR,
            old_flow_rate: 0,
            new_distributor_to_pool_flow_rate: 400,
            new_total_distribution_flow_rate: 400,
            adjustment_flow_rate: 0,
        }))
        .unwrap();

    engine.apply(&timeline.after(10, claim(alice))).unwrap();
    engine.apply(&timeline.after(0, claim(bob))).unwrap();

    let pool: Pool = load(engine.store(), &POOL.to_string());
    assert_eq!(pool.per_unit_flow_rate, 100);
    assert_eq!(pool.total_amount_flowed_distributed_until_updated_at, 4_000);

    let a: PoolMember = load(engine.store(), &PoolMember::id_for(&POOL, &alice));
    let b: PoolMember = load(engine.store(), &PoolMember::id_for(&POOL, &bob));
    assert_eq!(a.total_amount_received_until_updated_at, 1_000);
    assert_eq!(b.total_amount_received_until_updated_at, 3_000);
    assert_eq!(
        a.total_amount_received_until_updated_at + b.total_amount_received_until_updated_at,
        pool.total_amount_flowed_distributed_until_updated_at
    );

    // distributor pays the pool account
    assert_eq!(ats(engine.store(), DISTRIBUTOR).total_net_flow_rate, -400);
    assert_eq!(ats(engine.store(), POOL).total_net_flow_rate, 400);
}

#[test]
fn test_closed_streams_sum_to_zero() {
    let mut engine = memory_engine();
    let mut timeline = Timeline::new();
    let (a, b, c) = (account(1), account(2), account(3));

    for event in [flow(a, b, 100), flow(b, c, 40), flow(c, a, 60), flow(a, b, 30), flow(b, c, 0)] {
        engine.apply(&timeline.next(event)).unwrap();
        let sum: i128 = engine
            .store()
            .all::<AccountTokenSnapshot>()
            .unwrap()
            .iter()
            .map(|s| s.total_net_flow_rate)
            .sum();
        assert_eq!(sum, 0);
    }

    assert_eq!(ats(engine.store(), a).total_net_flow_rate, 30);
    assert_eq!(ats(engine.store(), b).total_net_flow_rate, 30);
    assert_eq!(ats(engine.store(), c).total_net_flow_rate, -60);
    assert_eq!(ats(engine.store(), b).active_outgoing_stream_count, 0);

    let stats: TokenStatistic = load(engine.store(), &TOKEN.to_string());
    assert_eq!(stats.total_number_of_active_streams, 2);
    assert_eq!(stats.total_outflow_rate, 90);

    let deleted: Stream = load(engine.store(), &Stream::id_for(&TOKEN, &b, &c));
    assert!(!deleted.is_current());
    // 40/s for the three seconds before deletion
    assert_eq!(deleted.streamed_until_updated_at, 120);

    assert!(invariants::check(engine.store()).unwrap().is_empty());
}

#[test]
fn test_subscription_lifecycle() {
    let mut engine = memory_engine();
    let mut timeline = Timeline::new();
    let publisher = account(7);
    let subscriber = account(8);
    let index_id = 0;
    let index_key = Index::id_for(&TOKEN, &publisher, index_id);
    let sub_key = Subscription::id_for(&index_key, &subscriber);

    let index_updated = |value: i128, pending: Units, approved: Units| ProtocolEvent::IndexUpdated {
        token: TOKEN,
        publisher,
        index_id,
        new_index_value: value,
        total_units_pending: pending,
        total_units_approved: approved,
    };
    let units = |units: Units| ProtocolEvent::SubscriptionUnitsUpdated {
        token: TOKEN,
        publisher,
        index_id,
        subscriber,
        units,
    };

    engine.apply(&timeline.next(index_updated(0, 0, 0))).unwrap();
    engine.apply(&timeline.next(units(100))).unwrap();
    engine.apply(&timeline.next(index_updated(30, 100, 0))).unwrap();

    let sub: Subscription = load(engine.store(), &sub_key);
    let index: Index = load(engine.store(), &index_key);
    assert!(!sub.approved);
    assert_eq!(index.total_units_pending, 100);
    assert_eq!(index.total_amount_distributed_until_updated_at, 3_000);

    engine
        .apply(&timeline.next(ProtocolEvent::SubscriptionApproved {
            token: TOKEN,
            publisher,
            index_id,
            subscriber,
        }))
        .unwrap();
    let sub: Subscription = load(engine.store(), &sub_key);
    let index: Index = load(engine.store(), &index_key);
    assert!(sub.approved);
    assert_eq!(sub.total_amount_received_until_updated_at, 3_000);
    assert_eq!(sub.index_value_until_updated_at, 30);
    assert_eq!((index.total_units_approved, index.total_units_pending), (100, 0));

    engine.apply(&timeline.next(index_updated(50, 0, 100))).unwrap();
    engine.apply(&timeline.next(units(40))).unwrap();

    let sub: Subscription = load(engine.store(), &sub_key);
    let index: Index = load(engine.store(), &index_key);
    assert_eq!(sub.total_amount_received_until_updated_at, 5_000);
    assert_eq!(sub.units, 40);
    assert_eq!(index.total_units_approved, 40);
    assert_eq!(ats(engine.store(), subscriber).balance_until_updated_at, 5_000);

    assert!(invariants::check(engine.store()).unwrap().is_empty());
}

#[test]
fn test_sqlite_ledger_resumes_ordering_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");
    let mut timeline = Timeline::new();
    let first = timeline.next(member_units(account(1), 0, 5));
    let second = timeline.next(member_units(account(2), 0, 5));
    let third = timeline.next(member_units(account(1), 5, 0));

    {
        let store = SqliteStore::open(&path).unwrap();
        let mut engine = LedgerEngine::new(store, AuditLog::new()).unwrap();
        engine.apply_all([&first, &second]).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let mut engine = LedgerEngine::new(store, AuditLog::new()).unwrap();
    assert_eq!(engine.checkpoint().unwrap().position, second.meta.position());

    let err = engine.apply(&first).unwrap_err();
    assert!(matches!(err, LedgerError::OutOfOrder { .. }));

    engine.apply(&third).unwrap();
    assert_eq!(engine.checkpoint().unwrap().events_applied, 3);

    let pool: Pool = load(engine.store(), &POOL.to_string());
    assert_eq!(pool.total_units, 5);
    assert_eq!(pool.total_members, 1);
    assert!(invariants::check(engine.store()).unwrap().is_empty());
}

#[test]
fn test_replay_lines_parse_and_apply() {
    let lines = r#"
{"meta":{"blockNumber":1,"timestamp":100,"logIndex":0},"event":"FlowUpdated","token":"0x2020202020202020202020202020202020202020","sender":"0x0101010101010101010101010101010101010101","receiver":"0x0202020202020202020202020202020202020202","flowRate":"385802469135802"}
{"meta":{"blockNumber":1,"timestamp":100,"logIndex":1},"event":"MemberUnitsUpdated","pool":"0x1010101010101010101010101010101010101010","token":"0x2020202020202020202020202020202020202020","member":"0x0303030303030303030303030303030303030303","oldUnits":"0","newUnits":"10"}
{"meta":{"blockNumber":2,"timestamp":112,"logIndex":0},"event":"PoolConnectionUpdated","pool":"0x1010101010101010101010101010101010101010","token":"0x2020202020202020202020202020202020202020","account":"0x0303030303030303030303030303030303030303","connected":true}
"#;
    let mut engine = memory_engine();
    for line in lines.lines().filter(|l| !l.trim().is_empty()) {
        let event: SequencedEvent = serde_json::from_str(line).unwrap();
        engine.apply(&event).unwrap();
    }

    assert_eq!(ats(engine.store(), account(1)).total_net_flow_rate, -385_802_469_135_802);
    let pool: Pool = load(engine.store(), &POOL.to_string());
    assert_eq!(pool.total_connected_units, 10);
    assert_eq!(ats(engine.store(), account(3)).total_connected_memberships, 1);
    assert_eq!(engine.checkpoint().unwrap().events_applied, 3);
}
