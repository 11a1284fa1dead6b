// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end resolution scenarios against canned cluster snapshots.
//!
//! Each test builds a gateway over static tables shaped like the indexer
//! layer would produce, then drives the full dispatch path through the
//! public API.

use async_trait::async_trait;
use dnsgate::gateway::{Gateway, ResponseWriter, ServeOutcome};
use dnsgate::resources::{RecordSets, ResourceKind, ResourceTable, StaticTable};
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

const ZONE: &str = "example.com.";

#[derive(Default)]
struct CapturedWriter {
    messages: Vec<Message>,
}

#[async_trait]
impl ResponseWriter for CapturedWriter {
    async fn write(&mut self, response: Message) -> std::io::Result<()> {
        self.messages.push(response);
        Ok(())
    }
}

fn request(name: &str, qtype: RecordType) -> Message {
    let mut message = Message::new();
    message.set_id(1234);
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    let mut query = Query::query(Name::from_str(name).unwrap(), qtype);
    query.set_query_class(DNSClass::IN);
    message.add_query(query);
    message
}

fn service_table(entries: &[(&str, &str)]) -> Arc<dyn ResourceTable> {
    let mut table = StaticTable::new(ResourceKind::Service);
    for (key, ip) in entries {
        table = table.with_entry(
            *key,
            RecordSets::default().with_address(ip.parse().unwrap()),
        );
    }
    Arc::new(table)
}

fn gateway(tables: Vec<Arc<dyn ResourceTable>>) -> Arc<Gateway> {
    Arc::new(Gateway::new(vec![ZONE.to_string()], tables))
}

async fn serve(gateway: &Arc<Gateway>, request: &Message) -> (ServeOutcome, Message) {
    let mut writer = CapturedWriter::default();
    let outcome = gateway
        .serve_dns(request, &mut writer)
        .await
        .expect("serve_dns");
    let response = writer.messages.into_iter().next().expect("one response");
    (outcome, response)
}

fn answer_ips(response: &Message) -> Vec<Ipv4Addr> {
    response
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::A(A(ip))) => Some(*ip),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn scenario_1_loadbalancer_service_answers_a() {
    let gateway = gateway(vec![service_table(&[("svc1.ns1", "192.0.1.1")])]);
    let (outcome, response) = serve(&gateway, &request("svc1.ns1.example.com.", RecordType::A)).await;

    assert_eq!(outcome, ServeOutcome::Written(ResponseCode::NoError));
    assert!(response.authoritative());
    assert_eq!(answer_ips(&response), vec![Ipv4Addr::new(192, 0, 1, 1)]);
    assert_eq!(response.answers()[0].ttl(), 60);
}

#[tokio::test]
async fn scenario_2_unknown_name_is_nxdomain_with_zone_soa() {
    let gateway = gateway(vec![service_table(&[("svc1.ns1", "192.0.1.1")])]);
    let (outcome, response) = serve(&gateway, &request("svcx.ns1.example.com.", RecordType::A)).await;

    assert_eq!(outcome, ServeOutcome::Written(ResponseCode::NXDomain));
    assert!(response.answers().is_empty());
    let soa = &response.name_servers()[0];
    assert_eq!(soa.record_type(), RecordType::SOA);
    assert_eq!(soa.name(), &Name::from_str(ZONE).unwrap());
}

fn wildcard_snapshot() -> Vec<Arc<dyn ResourceTable>> {
    let table = StaticTable::new(ResourceKind::Ingress)
        .with_entry(
            "*.wildcard.example.com",
            RecordSets::default().with_address("192.0.0.6".parse().unwrap()),
        )
        .with_entry(
            "specific-subdomain.wildcard.example.com",
            RecordSets::default().with_address("192.0.0.7".parse().unwrap()),
        );
    vec![Arc::new(table)]
}

#[tokio::test]
async fn scenario_3_explicit_record_masks_the_wildcard() {
    let gateway = gateway(wildcard_snapshot());
    let (_, response) = serve(
        &gateway,
        &request("specific-subdomain.wildcard.example.com.", RecordType::A),
    )
    .await;
    assert_eq!(answer_ips(&response), vec![Ipv4Addr::new(192, 0, 0, 7)]);
}

#[tokio::test]
async fn scenario_4_wildcard_answers_undefined_labels() {
    let gateway = gateway(wildcard_snapshot());
    let (_, response) = serve(
        &gateway,
        &request("not-defined.wildcard.example.com.", RecordType::A),
    )
    .await;
    assert_eq!(answer_ips(&response), vec![Ipv4Addr::new(192, 0, 0, 6)]);
}

#[tokio::test]
async fn scenario_5_cname_chain_resolves_to_addresses() {
    let table = StaticTable::new(ResourceKind::Service)
        .with_entry("www", RecordSets::default().with_cname("app.example.com."))
        .with_entry("app", RecordSets::default().with_cname("service.example.com."))
        .with_entry(
            "service",
            RecordSets::default().with_cname("api.example.com."),
        )
        .with_entry(
            "api",
            RecordSets::default()
                .with_address("10.0.1.100".parse().unwrap())
                .with_address("10.0.1.101".parse().unwrap()),
        );
    let gateway = gateway(vec![Arc::new(table)]);
    let (outcome, response) = serve(&gateway, &request("www.example.com.", RecordType::A)).await;

    assert_eq!(outcome, ServeOutcome::Written(ResponseCode::NoError));
    let cname_targets: Vec<String> = response
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::CNAME(target)) => Some(target.0.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(cname_targets, vec!["app.example.com.".to_string()]);
    assert_eq!(
        answer_ips(&response),
        vec![Ipv4Addr::new(10, 0, 1, 100), Ipv4Addr::new(10, 0, 1, 101)]
    );
}

#[tokio::test]
async fn scenario_6_cname_loop_returns_first_link_only() {
    let table = StaticTable::new(ResourceKind::Service)
        .with_entry("loop1", RecordSets::default().with_cname("loop2.example.com."))
        .with_entry("loop2", RecordSets::default().with_cname("loop1.example.com."));
    let gateway = gateway(vec![Arc::new(table)]);
    let (outcome, response) = serve(&gateway, &request("loop1.example.com.", RecordType::A)).await;

    assert_eq!(outcome, ServeOutcome::Written(ResponseCode::NoError));
    assert_eq!(response.answers().len(), 1);
    match response.answers()[0].data() {
        Some(RData::CNAME(target)) => {
            assert_eq!(target.0, Name::from_str("loop2.example.com.").unwrap());
        }
        other => panic!("expected CNAME, got {other:?}"),
    }
    assert!(answer_ips(&response).is_empty());
}

#[tokio::test]
async fn scenario_7_aaaa_for_ipv4_only_name_signals_no_data() {
    let gateway = gateway(vec![service_table(&[("svc2.ns1", "192.0.1.2")])]);
    let (outcome, response) =
        serve(&gateway, &request("svc2.ns1.example.com.", RecordType::AAAA)).await;

    assert_eq!(outcome, ServeOutcome::Written(ResponseCode::NoError));
    assert!(response.answers().is_empty());
    assert_eq!(response.name_servers().len(), 1);
    assert_eq!(response.name_servers()[0].record_type(), RecordType::SOA);
}

fn transfer_serial(record: &Record) -> u32 {
    match record.data() {
        Some(RData::SOA(soa)) => soa.serial(),
        other => panic!("expected SOA, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_8_transfer_with_current_serial_is_a_single_soa() {
    let gateway = gateway(vec![service_table(&[("svc1.ns1", "192.0.1.1")])]);

    // Learn the current serial the way a secondary would.
    let (_, response) = serve(&gateway, &request("example.com.", RecordType::SOA)).await;
    let current = transfer_serial(&response.answers()[0]);

    let mut stream = gateway.transfer(ZONE, current).expect("transfer");
    let first = stream.recv().await.expect("one group");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].record_type(), RecordType::SOA);
    assert!(stream.recv().await.is_none(), "channel closes after the SOA");
}

#[tokio::test]
async fn scenario_9_full_transfer_streams_the_whole_zone() {
    let table = StaticTable::new(ResourceKind::Ingress)
        .with_entry(
            "beta.example.com",
            RecordSets::default().with_address("192.0.2.2".parse().unwrap()),
        )
        .with_entry(
            "alpha.example.com",
            RecordSets::default().with_address("192.0.2.1".parse().unwrap()),
        );
    let glue: dnsgate::resources::ExternalAddressFn = Arc::new(|owner: &Name| {
        let mut record = Record::from_rdata(
            owner.clone(),
            300,
            RData::A(A(Ipv4Addr::new(203, 0, 113, 53))),
        );
        record.set_dns_class(DNSClass::IN);
        vec![record]
    });
    let gateway = Arc::new(
        Gateway::new(vec![ZONE.to_string()], vec![Arc::new(table)])
            .with_external_address(glue),
    );

    let mut stream = gateway.transfer(ZONE, 0).expect("transfer");
    let mut groups = Vec::new();
    while let Some(group) = stream.recv().await {
        groups.push(group);
    }

    // SOA, NS, glue, alpha, beta, SOA.
    assert_eq!(groups.len(), 6);
    assert_eq!(groups[0][0].record_type(), RecordType::SOA);
    assert_eq!(groups[1][0].record_type(), RecordType::NS);
    assert_eq!(groups[2][0].record_type(), RecordType::A);
    assert_eq!(groups[3][0].name().to_string(), "alpha.example.com.");
    assert_eq!(groups[4][0].name().to_string(), "beta.example.com.");
    let last = groups.last().unwrap();
    assert_eq!(last[0], groups[0][0], "stream is bracketed by the same SOA");
    assert_eq!(transfer_serial(&last[0]), transfer_serial(&groups[0][0]));
}

#[tokio::test]
async fn mixed_case_queries_match_lowercase_records() {
    let gateway = gateway(vec![service_table(&[("svc1.ns1", "192.0.1.1")])]);
    let (outcome, response) =
        serve(&gateway, &request("SVC1.NS1.EXAMPLE.COM.", RecordType::A)).await;

    assert_eq!(outcome, ServeOutcome::Written(ResponseCode::NoError));
    assert_eq!(answer_ips(&response), vec![Ipv4Addr::new(192, 0, 1, 1)]);
    assert_eq!(response.answers()[0].name().to_string(), "SVC1.NS1.EXAMPLE.COM.");
}
