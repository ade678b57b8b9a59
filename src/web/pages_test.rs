//! Request-level tests for the page handlers

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::store::memory::MemoryControlApi;
    use crate::store::{Client, ConsoleStore, DnsConfig, Rewrite, ServiceType, StatusInfo};
    use crate::web::pages::{ConsoleRequest, Pages, Reply};
    use crate::web::WebError;

    fn pages(api: MemoryControlApi) -> (Pages<'static>, Arc<MemoryControlApi>) {
        let api = Arc::new(api);
        let store = ConsoleStore::new(api.clone());
        (Pages::new(store, "nas.home"), api)
    }

    fn page_data(reply: Reply) -> serde_json::Value {
        match reply {
            Reply::Page { data, .. } => data,
            other => panic!("expected a page, got {:?}", other),
        }
    }

    fn location(reply: Reply) -> String {
        match reply {
            Reply::Redirect(location) => location,
            other => panic!("expected a redirect, got {:?}", other),
        }
    }

    #[test]
    fn test_rewrites_page_fetches_once() {
        let (pages, api) = pages(MemoryControlApi::new().with_rewrites(vec![Rewrite::new("nas.home", "10.0.0.2")]));

        let data = page_data(pages.route(&ConsoleRequest::get("/filters/rewrites")).unwrap());
        assert_eq!(data["page"]["list"][0]["answer"], "10.0.0.2");

        pages.route(&ConsoleRequest::get("/filters/rewrites")).unwrap();
        assert_eq!(api.calls(), vec!["rewrite_list"]);

        pages.route(&ConsoleRequest::get("/filters/rewrites?refresh=1")).unwrap();
        assert_eq!(api.calls(), vec!["rewrite_list", "rewrite_list"]);
    }

    #[test]
    fn test_add_rewrite_flow() {
        let (pages, api) = pages(MemoryControlApi::new());

        let data = page_data(pages.route(&ConsoleRequest::get("/filters/rewrites?modal=add")).unwrap());
        assert_eq!(data["page"]["modal"]["kind"], "add_rewrite");

        let reply = pages
            .route(&ConsoleRequest::post(
                "/filters/rewrites",
                &[("domain", "media.home"), ("answer", "10.0.0.5")],
            ))
            .unwrap();
        assert_eq!(location(reply), "/filters/rewrites");
        assert!(api.calls().contains(&"rewrite_add".to_string()));

        let data = page_data(pages.route(&ConsoleRequest::get("/filters/rewrites")).unwrap());
        assert_eq!(data["page"]["list"][0]["domain"], "media.home");
        assert!(data["page"]["modal"].is_null());
        assert_eq!(data["notifications"][0]["level"], "success");
    }

    #[test]
    fn test_invalid_rewrite_rerenders_with_errors() {
        let (pages, api) = pages(MemoryControlApi::new());
        pages.route(&ConsoleRequest::get("/filters/rewrites?modal=add")).unwrap();

        let data = page_data(
            pages
                .route(&ConsoleRequest::post("/filters/rewrites", &[("domain", ""), ("answer", "")]))
                .unwrap(),
        );

        assert_eq!(data["page"]["modal"]["fields"][0]["error"], "Required field");
        assert!(!api.calls().contains(&"rewrite_add".to_string()));
    }

    #[test]
    fn test_edit_rewrite_sends_target_and_update() {
        let (pages, api) = pages(MemoryControlApi::new().with_rewrites(vec![Rewrite::new("nas.home", "10.0.0.2")]));
        pages
            .route(&ConsoleRequest::get("/filters/rewrites?modal=edit&domain=nas.home&answer=10.0.0.2"))
            .unwrap();

        pages
            .route(&ConsoleRequest::post(
                "/filters/rewrites",
                &[("domain", "nas.home"), ("answer", "10.0.0.3")],
            ))
            .unwrap();

        assert!(api.calls().contains(&"rewrite_update".to_string()));
        let list = pages.store().select(|s| s.rewrites.list.clone());
        assert_eq!(list, vec![Rewrite::new("nas.home", "10.0.0.3")]);
    }

    #[test]
    fn test_delete_asks_for_confirmation() {
        let (pages, api) = pages(MemoryControlApi::new().with_rewrites(vec![Rewrite::new("nas.home", "10.0.0.2")]));
        let fields = [("domain", "nas.home"), ("answer", "10.0.0.2")];

        let data = page_data(pages.route(&ConsoleRequest::post("/filters/rewrites/delete", &fields)).unwrap());
        assert_eq!(
            data["page"]["prompt"],
            "Are you sure you want to delete DNS rewrite for \"nas.home\"?"
        );
        assert!(api.calls().is_empty());

        let declined = [("domain", "nas.home"), ("answer", "10.0.0.2"), ("confirm", "no")];
        pages.route(&ConsoleRequest::post("/filters/rewrites/delete", &declined)).unwrap();
        assert!(!api.calls().contains(&"rewrite_delete".to_string()));

        let confirmed = [("domain", "nas.home"), ("answer", "10.0.0.2"), ("confirm", "yes")];
        pages.route(&ConsoleRequest::post("/filters/rewrites/delete", &confirmed)).unwrap();
        assert!(api.calls().contains(&"rewrite_delete".to_string()));
    }

    #[test]
    fn test_delete_requires_fields() {
        let (pages, _) = pages(MemoryControlApi::new());
        let result = pages.route(&ConsoleRequest::post("/filters/rewrites/delete", &[("domain", "x")]));
        assert!(matches!(result, Err(WebError::MissingField("answer"))));
    }

    #[test]
    fn test_backend_failure_becomes_notification() {
        let (pages, api) = pages(MemoryControlApi::new());
        api.fail_next("rewrite_list");

        let data = page_data(pages.route(&ConsoleRequest::get("/filters/rewrites")).unwrap());
        assert_eq!(data["notifications"][0]["level"], "error");
        assert_eq!(data["page"]["loaded"], false);
    }

    #[test]
    fn test_ddns_script_download() {
        let (pages, _) = pages(MemoryControlApi::new());
        let request = ConsoleRequest::get("/control/ddns/script/macos?domain=media.home")
            .with_header("Host", "console.lan")
            .with_header("Cookie", "agh_session=s1; theme=dark");

        match pages.route(&request).unwrap() {
            Reply::Download(script) => {
                assert_eq!(script.file_name, "ddns-script.sh");
                assert!(script.body.contains("DOMAIN=\"media.home\""));
                assert!(script.body.contains("COOKIE=\"agh_session=s1\""));
                assert!(!script.body.contains("theme"));
            }
            other => panic!("expected a download, got {:?}", other),
        }
    }

    #[test]
    fn test_ddns_unknown_os() {
        let (pages, _) = pages(MemoryControlApi::new());
        let result = pages.route(&ConsoleRequest::get("/control/ddns/script/amiga"));
        assert!(matches!(result, Err(WebError::NotFound)));
    }

    #[test]
    fn test_dns_settings_file_managed() {
        let config = DnsConfig {
            upstream_dns_file: "/opt/upstreams.txt".to_string(),
            upstream_alternate_dns: vec!["1.1.1.1".to_string()],
            ..Default::default()
        };
        let (pages, api) = pages(MemoryControlApi::new().with_dns_config(config));

        let data = page_data(pages.route(&ConsoleRequest::get("/settings/dns")).unwrap());
        assert_eq!(
            data["page"]["fields"][0]["value"],
            "Upstreams are configured in file /opt/upstreams.txt"
        );
        assert_eq!(data["page"]["fields"][0]["readonly"], true);

        pages
            .route(&ConsoleRequest::post(
                "/settings/dns",
                &[
                    ("upstream_alternate_dns", "9.9.9.9"),
                    ("upstream_alternate_rulesets", "https://example.org/list.txt"),
                    ("action", "save"),
                ],
            ))
            .unwrap();

        let stored = api.dns_config();
        assert_eq!(stored.upstream_alternate_dns, vec!["1.1.1.1".to_string()]);
        assert_eq!(
            stored.upstream_alternate_rulesets,
            vec!["https://example.org/list.txt".to_string()]
        );
    }

    #[test]
    fn test_dns_settings_pristine_submit_is_noop() {
        let (pages, api) = pages(MemoryControlApi::new().with_dns_config(DnsConfig {
            upstream_alternate_dns: vec!["1.1.1.1".to_string()],
            ..Default::default()
        }));
        pages.route(&ConsoleRequest::get("/settings/dns")).unwrap();

        let reply = pages
            .route(&ConsoleRequest::post(
                "/settings/dns",
                &[("upstream_alternate_dns", "1.1.1.1"), ("upstream_alternate_rulesets", "")],
            ))
            .unwrap();

        assert_eq!(location(reply), "/settings/dns");
        assert!(!api.calls().contains(&"set_dns_config".to_string()));
    }

    #[test]
    fn test_dns_settings_test_upstreams() {
        let (pages, api) = pages(MemoryControlApi::new());
        pages.route(&ConsoleRequest::get("/settings/dns")).unwrap();

        let data = page_data(
            pages
                .route(&ConsoleRequest::post(
                    "/settings/dns",
                    &[
                        ("upstream_alternate_dns", "1.1.1.1\ninvalid.example"),
                        ("upstream_alternate_rulesets", ""),
                        ("action", "test"),
                    ],
                ))
                .unwrap(),
        );

        assert!(api.calls().contains(&"test_upstream_dns".to_string()));
        assert_eq!(data["page"]["test_results"].as_array().map(Vec::len), Some(2));
        assert_eq!(data["notifications"][0]["level"], "error");
    }

    #[test]
    fn test_clients_tier_gating() {
        let api = MemoryControlApi::new()
            .with_clients(vec![Client {
                name: "laptop".to_string(),
                ids: vec!["10.0.0.9".to_string()],
                ..Default::default()
            }])
            .with_status(StatusInfo {
                version: "v1".to_string(),
                service_type: Some("personal".to_string()),
                ..Default::default()
            });
        let (pages, _) = pages(api);

        let data = page_data(pages.route(&ConsoleRequest::get("/settings/clients?edit=laptop")).unwrap());
        assert_eq!(data["page"]["service_type"], "personal");
        assert_eq!(data["page"]["form"]["protection"].as_array().map(Vec::len), Some(0));
        assert_eq!(data["page"]["form"]["safe_search"].as_array().map(Vec::len), Some(0));
        assert_eq!(data["page"]["form"]["logs"].as_array().map(Vec::len), Some(2));
        assert_eq!(data["version"]["version"], "v1");
    }

    #[test]
    fn test_clients_unknown_edit_target() {
        let (pages, _) = pages(MemoryControlApi::new());
        let result = pages.route(&ConsoleRequest::get("/settings/clients?edit=ghost"));
        assert!(matches!(result, Err(WebError::NotFound)));
    }

    #[test]
    fn test_client_update_keeps_disabled_values() {
        let mut laptop = Client {
            name: "laptop".to_string(),
            ids: vec!["10.0.0.9".to_string()],
            use_global_settings: true,
            filtering_enabled: true,
            ..Default::default()
        };
        laptop.safe_search.services.insert("google".to_string(), true);

        let api = MemoryControlApi::new().with_clients(vec![laptop]).with_status(StatusInfo {
            service_type: Some("family".to_string()),
            ..Default::default()
        });
        let (pages, _) = pages(api);
        pages.route(&ConsoleRequest::get("/settings/clients")).unwrap();
        assert_eq!(
            pages.store().select(|s| s.dashboard.service_type),
            Some(ServiceType::Family)
        );

        // Disabled checkboxes are not posted by browsers
        pages
            .route(&ConsoleRequest::post(
                "/settings/clients",
                &[
                    ("editing", "laptop"),
                    ("name", "laptop"),
                    ("ids", "10.0.0.9\n10.0.0.10"),
                    ("use_global_settings", "on"),
                ],
            ))
            .unwrap();

        let stored = pages.store().select(|s| s.clients.list[0].clone());
        assert_eq!(stored.ids, vec!["10.0.0.9".to_string(), "10.0.0.10".to_string()]);
        assert!(stored.filtering_enabled);
        assert_eq!(stored.safe_search.services.get("google"), Some(&true));
    }

    #[test]
    fn test_client_update_keeps_hidden_tier_values() {
        let mut laptop = Client {
            name: "laptop".to_string(),
            ids: vec!["10.0.0.9".to_string()],
            use_global_settings: false,
            filtering_enabled: true,
            parental_enabled: true,
            ..Default::default()
        };
        laptop.safe_search.enabled = true;
        laptop.safe_search.services.insert("youtube".to_string(), true);
        laptop
            .extra
            .insert("tags".to_string(), serde_json::json!(["device_laptop"]));

        let api = MemoryControlApi::new().with_clients(vec![laptop]).with_status(StatusInfo {
            service_type: Some("personal".to_string()),
            ..Default::default()
        });
        let (pages, _) = pages(api);
        pages.route(&ConsoleRequest::get("/settings/clients")).unwrap();

        let reply = pages
            .route(&ConsoleRequest::post(
                "/settings/clients",
                &[("editing", "laptop"), ("name", "laptop"), ("ids", "10.0.0.9")],
            ))
            .unwrap();
        assert_eq!(location(reply), "/settings/clients");

        let stored = pages.store().select(|s| s.clients.list[0].clone());
        assert!(!stored.use_global_settings);
        assert!(stored.filtering_enabled);
        assert!(stored.parental_enabled);
        assert!(stored.safe_search.enabled);
        assert_eq!(stored.safe_search.services.get("youtube"), Some(&true));
        assert_eq!(stored.extra.get("tags"), Some(&serde_json::json!(["device_laptop"])));
    }

    #[test]
    fn test_login_submit() {
        let (pages, api) = pages(MemoryControlApi::new().with_credentials("alice", "secret"));

        let data = page_data(
            pages
                .route(&ConsoleRequest::post("/login", &[("username", "alice"), ("password", "wrong")]))
                .unwrap(),
        );
        assert_eq!(data["notifications"][0]["level"], "error");

        let reply = pages
            .route(&ConsoleRequest::post("/login", &[("username", "alice"), ("password", "secret")]))
            .unwrap();
        assert_eq!(location(reply), "/");
        assert_eq!(api.calls(), vec!["login", "login"]);
        assert!(pages.store().select(|s| s.login.authenticated));
    }

    #[test]
    fn test_login_requires_both_fields() {
        let (pages, api) = pages(MemoryControlApi::new());
        let data = page_data(
            pages
                .route(&ConsoleRequest::post("/login", &[("username", "alice"), ("password", "")]))
                .unwrap(),
        );

        assert_eq!(data["page"]["fields"][1]["error"], "Required field");
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_unknown_route() {
        let (pages, _) = pages(MemoryControlApi::new());
        assert!(matches!(
            pages.route(&ConsoleRequest::get("/nope")),
            Err(WebError::NotFound)
        ));
    }
}
