use serde_json::{Value, json};
use stencil_compiler::Host;
use stencil_dom::Data;
use stencil_expr::value;

struct Page(Value);

impl Data for Page {
    fn get(&mut self, keypath: &str) -> Option<Value> {
        value::get_path(&self.0, keypath)
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Option<Value> {
        match (name, args.first()) {
            ("upper", Some(Value::String(s))) => Some(Value::from(s.to_uppercase())),
            _ => None,
        }
    }
}

impl Host for Page {
    fn partial(&self, name: &str) -> Option<String> {
        (name == "shared").then(|| "<footer>{{items.length}} items</footer>".to_string())
    }
}

fn main() {
    let mut page = Page(json!({
        "filter": "all",
        "title": "groceries",
        "user": { "name": "tom" },
        "items": [{ "title": "milk" }, { "title": "bread" }],
        "pages": 3,
        "props": { "color": "green" },
    }));
    match stencil_todo::render(&mut page) {
        Ok(nodes) => println!("{nodes:#?}"),
        Err(err) => eprintln!("render failed: {err}"),
    }
}
