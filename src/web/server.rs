use handlebars::Handlebars;
use tiny_http::{Header, Method, Request, Response, ResponseBox, Server};

use crate::ddns::encode_uri_component;
use crate::store::ConsoleStore;
use crate::web::pages::{ConsoleRequest, Pages, Reply};
use crate::web::util::{parse_formdata, parse_json_body};
use crate::web::{Result, WebError};

trait MediaType {
    fn json_input(&self) -> bool;
    fn json_output(&self) -> bool;
}

impl MediaType for Request {
    fn json_input(&self) -> bool {
        self.headers()
            .iter()
            .find(|x| x.field.equiv("Content-Type"))
            .map(|x| x.value.as_str().contains("application/json"))
            .unwrap_or_default()
    }

    fn json_output(&self) -> bool {
        self.headers()
            .iter()
            .find(|x| x.field.equiv("Accept"))
            .map(|x| x.value.as_str().contains("application/json"))
            .unwrap_or_default()
    }
}

fn header(field: &str, value: &str) -> Result<Header> {
    Header::from_bytes(field.as_bytes(), value.as_bytes()).map_err(|_| WebError::InvalidRequest)
}

pub struct WebServer<'a> {
    pub handlebars: Handlebars<'a>,
    pages: Pages<'a>,
}

impl<'a> WebServer<'a> {
    pub fn new(store: ConsoleStore, ddns_default_domain: &str) -> WebServer<'a> {
        let mut handlebars = Handlebars::new();

        // Register the 'eq' helper for comparing values in templates
        handlebars.register_helper(
            "eq",
            Box::new(|h: &handlebars::Helper, _: &Handlebars, _: &handlebars::Context, _: &mut handlebars::RenderContext, out: &mut dyn handlebars::Output| -> handlebars::HelperResult {
                let param1 = h.param(0).map(|v| v.value());
                let param2 = h.param(1).map(|v| v.value());

                if param1.is_some() && param1 == param2 {
                    out.write("true")?;
                }
                Ok(())
            })
        );

        // Register the 'urlencode' helper for query string values
        handlebars.register_helper(
            "urlencode",
            Box::new(|h: &handlebars::Helper, _: &Handlebars, _: &handlebars::Context, _: &mut handlebars::RenderContext, out: &mut dyn handlebars::Output| -> handlebars::HelperResult {
                if let Some(text) = h.param(0).and_then(|v| v.value().as_str()) {
                    out.write(&encode_uri_component(text))?;
                }
                Ok(())
            })
        );

        let mut server = WebServer {
            handlebars,
            pages: Pages::new(store, ddns_default_domain),
        };

        let mut register_template = |name, data: &str| {
            if server
                .handlebars
                .register_template_string(name, data)
                .is_err()
            {
                log::info!("Failed to register template {}", name);
            }
        };

        register_template("layout", include_str!("templates/layout.html"));
        register_template("field", include_str!("templates/field.html"));
        register_template("index", include_str!("templates/index.html"));
        register_template("login", include_str!("templates/login.html"));
        register_template("rewrites", include_str!("templates/rewrites.html"));
        register_template("dns", include_str!("templates/dns.html"));
        register_template("clients", include_str!("templates/clients.html"));
        register_template("confirm", include_str!("templates/confirm.html"));

        server
    }

    pub fn pages(&self) -> &Pages<'a> {
        &self.pages
    }

    /// Decode the request line, headers and body into a `ConsoleRequest`
    fn decode_request(&self, request: &mut Request) -> Result<ConsoleRequest> {
        let mut decoded = ConsoleRequest::new(request.method().clone(), request.url());
        for header in request.headers() {
            decoded = decoded.with_header(header.field.as_str().as_str(), header.value.as_str());
        }

        if *request.method() == Method::Post {
            decoded.form = if request.json_input() {
                parse_json_body(&mut request.as_reader())?
            } else {
                parse_formdata(&mut request.as_reader())?
            };
        }

        Ok(decoded)
    }

    /// Route an HTTP request to the appropriate handler
    fn route_request(&self, request: &mut Request) -> Result<ResponseBox> {
        let decoded = self.decode_request(request)?;
        let reply = self.pages.route(&decoded)?;
        self.render_reply(request, reply)
    }

    /// Handle a single HTTP request
    fn handle_request(&self, mut request: Request) {
        log::info!("HTTP {:?} {:?}", request.method(), request.url());

        let response = self.route_request(&mut request);
        let response_result = self.send_response(request, response);

        if let Err(err) = response_result {
            log::info!("Failed to write response to client: {:?}", err);
        }
    }

    /// Send the response back to the client with proper error handling
    fn send_response(&self, request: Request, response: Result<ResponseBox>) -> std::io::Result<()> {
        match response {
            Ok(response) => request.respond(response),
            Err(err) if request.json_output() => {
                log::info!("Request failed: {:?}", err);
                let error_json = serde_json::json!({
                    "message": err.to_string(),
                });
                request.respond(
                    Response::from_string(error_json.to_string())
                        .with_status_code(err.status_code())
                        .boxed(),
                )
            }
            Err(err) => {
                log::info!("Request failed: {:?}", err);
                request.respond(
                    Response::from_string(err.to_string())
                        .with_status_code(err.status_code())
                        .boxed(),
                )
            }
        }
    }

    pub fn run_webserver(self, bind_address: &str) {
        let webserver = match Server::http(bind_address) {
            Ok(x) => x,
            Err(e) => {
                log::error!("Failed to start HTTP web server: {:?}", e);
                return;
            }
        };

        log::info!("HTTP web server started and listening on {}", bind_address);

        for request in webserver.incoming_requests() {
            self.handle_request(request);
        }
    }

    /// Render a page as HTML, or as JSON when the client asks for it
    pub fn render_page(&self, json_output: bool, template: &str, data: &serde_json::Value) -> Result<String> {
        Ok(if json_output {
            serde_json::to_string(data)?
        } else {
            self.handlebars.render(template, data)?
        })
    }

    fn render_reply(&self, request: &Request, reply: Reply) -> Result<ResponseBox> {
        Ok(match reply {
            Reply::Page { template, data } => {
                let json_output = request.json_output();
                let content_type = if json_output { "application/json" } else { "text/html; charset=utf-8" };
                Response::from_string(self.render_page(json_output, template, &data)?)
                    .with_header(header("Content-Type", content_type)?)
                    .boxed()
            }
            Reply::Redirect(location) => {
                Response::empty(if request.json_output() { 201 } else { 302 })
                    .with_header(header("Location", &location)?)
                    .boxed()
            }
            Reply::Download(script) => {
                let disposition = format!("attachment; filename=\"{}\"", script.file_name);
                Response::from_data(script.body.into_bytes())
                    .with_header(header("Content-Type", script.content_type)?)
                    .with_header(header("Content-Disposition", &disposition)?)
                    .boxed()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::memory::MemoryControlApi;
    use crate::store::Rewrite;

    fn server() -> WebServer<'static> {
        let api = MemoryControlApi::new().with_rewrites(vec![Rewrite::new("nas.home", "192.168.1.10")]);
        WebServer::new(ConsoleStore::new(Arc::new(api)), "nas.home")
    }

    fn render(server: &WebServer, request: ConsoleRequest) -> String {
        match server.pages().route(&request).unwrap() {
            Reply::Page { template, data } => server.render_page(false, template, &data).unwrap(),
            other => panic!("expected a page, got {:?}", other),
        }
    }

    #[test]
    fn test_all_templates_registered() {
        let server = server();
        for name in &["layout", "field", "index", "login", "rewrites", "dns", "clients", "confirm"] {
            assert!(server.handlebars.get_template(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_render_rewrites_page() {
        let server = server();
        let html = render(&server, ConsoleRequest::get("/filters/rewrites"));

        assert!(html.contains("nas.home"));
        assert!(html.contains("/control/ddns/script/linux?domain"));
        assert!(html.contains("data-testid=\"ddns_windows\""));
    }

    #[test]
    fn test_render_login_page_with_autofill() {
        let server = server();
        let html = render(
            &server,
            ConsoleRequest::get("/login").with_header("Host", "alice.adguardprivate.com"),
        );
        assert!(html.contains("value=\"alice\""));
    }

    #[test]
    fn test_render_page_as_json() {
        let server = server();
        let reply = server.pages().route(&ConsoleRequest::get("/filters/rewrites")).unwrap();
        if let Reply::Page { template, data } = reply {
            let body = server.render_page(true, template, &data).unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(parsed["page"]["list"][0]["domain"], "nas.home");
        } else {
            panic!("expected a page");
        }
    }
}
