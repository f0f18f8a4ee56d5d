use recon_forge::external::tools::{parse_plain_lines, parse_port_lines, parse_probe_lines};

#[test]
fn plain_lines_dedup_keeps_first_seen_order() {
    let out = "b.example.com\n\n  a.example.com  \nb.example.com\nc.example.com\n";
    let hosts = parse_plain_lines(out);
    assert_eq!(hosts, vec!["b.example.com", "a.example.com", "c.example.com"]);
}

#[test]
fn plain_lines_empty_output_yields_nothing() {
    assert!(parse_plain_lines("").is_empty());
    assert!(parse_plain_lines("\n \n\t\n").is_empty());
}

#[test]
fn port_lines_aggregate_per_host_in_output_order() {
    let out = concat!(
        "{\"host\":\"a.example.com\",\"port\":80}\n",
        "{\"host\":\"b.example.com\",\"port\":22}\n",
        "{\"host\":\"a.example.com\",\"port\":443}\n",
    );
    let (map, malformed) = parse_port_lines(out);
    assert_eq!(malformed, 0);
    assert_eq!(map["a.example.com"], vec![80, 443]);
    assert_eq!(map["b.example.com"], vec![22]);
}

#[test]
fn port_lines_fall_back_to_ip_when_host_missing() {
    let out = "{\"ip\":\"192.0.2.1\",\"port\":8080}\n";
    let (map, malformed) = parse_port_lines(out);
    assert_eq!(malformed, 0);
    assert_eq!(map["192.0.2.1"], vec![8080]);
}

#[test]
fn port_lines_skip_and_count_malformed() {
    let out = concat!(
        "{\"host\":\"a.example.com\",\"port\":80}\n",
        "not json at all\n",
        "{\"host\":\"a.example.com\"}\n", // no port
        "{\"host\":\"a.example.com\",\"port\":443}\n",
    );
    let (map, malformed) = parse_port_lines(out);
    assert_eq!(malformed, 2);
    assert_eq!(map["a.example.com"], vec![80, 443]);
}

#[test]
fn probe_lines_parse_fields_and_mark_alive() {
    let out = concat!(
        "{\"input\":\"a.example.com\",\"host\":\"198.51.100.7\",\"status_code\":200,",
        "\"content_length\":512,\"title\":\"Home\",\"tech\":[\"nginx\",\"php\"]}\n",
    );
    let (probes, malformed) = parse_probe_lines(out);
    assert_eq!(malformed, 0);
    assert_eq!(probes.len(), 1);
    let p = &probes[0];
    assert_eq!(p.host, "a.example.com");
    assert_eq!(p.ip.as_deref(), Some("198.51.100.7"));
    assert_eq!(p.status_code, Some(200));
    assert_eq!(p.content_length, Some(512));
    assert_eq!(p.title.as_deref(), Some("Home"));
    assert_eq!(p.technologies, vec!["nginx", "php"]);
    assert!(p.alive);
}

#[test]
fn probe_lines_skip_malformed_and_keep_valid() {
    let out = concat!(
        "{\"input\":\"a.example.com\",\"status_code\":200}\n",
        "{{{{ broken\n",
        "{\"input\":\"b.example.com\",\"status_code\":404}\n",
    );
    let (probes, malformed) = parse_probe_lines(out);
    assert_eq!(malformed, 1);
    assert_eq!(probes.len(), 2);
    assert_eq!(probes[1].host, "b.example.com");
    assert_eq!(probes[1].status_code, Some(404));
}

#[test]
fn probe_lines_tolerate_missing_optional_fields() {
    let out = "{\"input\":\"a.example.com\"}\n";
    let (probes, malformed) = parse_probe_lines(out);
    assert_eq!(malformed, 0);
    let p = &probes[0];
    assert!(p.status_code.is_none());
    assert!(p.technologies.is_empty());
    assert!(p.alive);
}
