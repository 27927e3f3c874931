//! In-memory page used by the unit tests. Elements are keyed by the exact
//! selector string the resolver produces (`#user`, `xpath=//a`, `testId=save`).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{FilePayload, Page, PageError};
use crate::selector::{Locator, Target};

pub const BASE_URL: &str = "http://app.local";

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub key: String,
    pub text: String,
    pub value: String,
    pub hidden: bool,
    pub attributes: HashMap<String, String>,
    pub styles: HashMap<String, String>,
    pub files: Vec<FilePayload>,
}

impl FakeElement {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.styles.insert(property.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    url: String,
    title: String,
    html: String,
    elements: Vec<FakeElement>,
    titles: HashMap<String, String>,
    click_navigation: HashMap<String, String>,
    click_removes: Vec<String>,
    evaluate_result: Value,
    failing: HashMap<String, String>,
    log: Vec<String>,
    options: Vec<(String, Value)>,
}

#[derive(Debug, Default)]
pub struct FakePage {
    state: Mutex<FakeState>,
}

fn key_of(target: &Target) -> String {
    match &target.locator {
        Locator::Selector(selector) => selector.clone(),
        Locator::TestId(id) => format!("testId={}", id),
    }
}

impl FakePage {
    pub fn new() -> Self {
        let page = Self::default();
        page.state.lock().unwrap().url = "about:blank".to_string();
        page
    }

    pub fn with(self, element: FakeElement) -> Self {
        self.state.lock().unwrap().elements.push(element);
        self
    }

    pub fn with_title(self, path: &str, title: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .titles
            .insert(path.to_string(), title.to_string());
        self
    }

    pub fn with_html(self, html: &str) -> Self {
        self.state.lock().unwrap().html = html.to_string();
        self
    }

    /// Clicking `key` navigates to `path`.
    pub fn navigate_on_click(self, key: &str, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .click_navigation
            .insert(key.to_string(), path.to_string());
        self
    }

    /// Clicking an element of `key` removes that element from the page.
    pub fn remove_on_click(self, key: &str) -> Self {
        self.state.lock().unwrap().click_removes.push(key.to_string());
        self
    }

    /// Operations whose log line starts with `prefix` fail with `message`.
    pub fn fail_on(self, prefix: &str, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(prefix.to_string(), message.to_string());
        self
    }

    pub fn with_evaluate_result(self, value: Value) -> Self {
        self.state.lock().unwrap().evaluate_result = value;
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// `(operation, options)` for every call that carried options.
    pub fn options_log(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().options.clone()
    }

    fn note_options(&self, operation: String, options: Option<&Value>) {
        if let Some(options) = options {
            self.state
                .lock()
                .unwrap()
                .options
                .push((operation, options.clone()));
        }
    }

    pub fn files_of(&self, key: &str) -> Vec<FilePayload> {
        let state = self.state.lock().unwrap();
        state
            .elements
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.files.clone())
            .unwrap_or_default()
    }

    pub fn value_of(&self, key: &str, index: usize) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .elements
            .iter()
            .filter(|e| e.key == key)
            .nth(index)
            .map(|e| e.value.clone())
    }

    fn record(&self, state: &mut FakeState, line: String) -> Result<(), PageError> {
        let failure = state
            .failing
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, message)| message.clone());
        state.log.push(line);
        match failure {
            Some(message) => Err(PageError::Automation(message)),
            None => Ok(()),
        }
    }

    fn with_element<T>(
        &self,
        target: &Target,
        f: impl FnOnce(&mut FakeElement) -> T,
    ) -> Result<T, PageError> {
        let mut state = self.state.lock().unwrap();
        let key = key_of(target);
        let index = target.nth.unwrap_or(0);
        state
            .elements
            .iter_mut()
            .filter(|e| e.key == key)
            .nth(index)
            .map(f)
            .ok_or_else(|| PageError::NotFound(target.to_string()))
    }

    fn act(&self, target: &Target, line: String) -> Result<(), PageError> {
        self.with_element(target, |_| ())?;
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, line)
    }

    fn navigate(state: &mut FakeState, path: &str) {
        state.url = if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", BASE_URL, path)
        };
        state.title = state.titles.get(path).cloned().unwrap_or_default();
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str, options: Option<&Value>) -> Result<(), PageError> {
        {
            let mut state = self.state.lock().unwrap();
            self.record(&mut state, format!("goto {}", url))?;
            Self::navigate(&mut state, url);
        }
        self.note_options(format!("goto {}", url), options);
        Ok(())
    }

    async fn count(&self, target: &Target) -> Result<usize, PageError> {
        let state = self.state.lock().unwrap();
        let key = key_of(target);
        let total = state.elements.iter().filter(|e| e.key == key).count();
        Ok(match target.nth {
            Some(n) => usize::from(n < total),
            None => total,
        })
    }

    async fn fill(&self, target: &Target, value: &str, options: Option<&Value>) -> Result<(), PageError> {
        self.act(target, format!("fill {} {}", target, value))?;
        self.note_options(format!("fill {}", target), options);
        self.with_element(target, |e| e.value = value.to_string())
    }

    async fn type_text(&self, target: &Target, text: &str, options: Option<&Value>) -> Result<(), PageError> {
        self.act(target, format!("type {} {}", target, text))?;
        self.note_options(format!("type {}", target), options);
        self.with_element(target, |e| e.value.push_str(text))
    }

    async fn click(&self, target: &Target, options: Option<&Value>) -> Result<(), PageError> {
        self.act(target, format!("click {}", target))?;
        self.note_options(format!("click {}", target), options);
        let mut state = self.state.lock().unwrap();
        let key = key_of(target);
        if let Some(path) = state.click_navigation.get(&key).cloned() {
            Self::navigate(&mut state, &path);
        }
        if state.click_removes.contains(&key) {
            let index = target.nth.unwrap_or(0);
            let position = state
                .elements
                .iter()
                .enumerate()
                .filter(|(_, e)| e.key == key)
                .nth(index)
                .map(|(i, _)| i);
            if let Some(i) = position {
                state.elements.remove(i);
            }
        }
        Ok(())
    }

    async fn hover(&self, target: &Target, options: Option<&Value>) -> Result<(), PageError> {
        self.act(target, format!("hover {}", target))?;
        self.note_options(format!("hover {}", target), options);
        Ok(())
    }

    async fn press(&self, target: &Target, key: &str, options: Option<&Value>) -> Result<(), PageError> {
        self.act(target, format!("press {} {}", target, key))?;
        self.note_options(format!("press {}", target), options);
        Ok(())
    }

    async fn set_input_files(&self, target: &Target, files: &[FilePayload]) -> Result<(), PageError> {
        self.act(target, format!("setInputFiles {} {}", target, files.len()))?;
        let files = files.to_vec();
        self.with_element(target, |e| e.files = files)
    }

    async fn wait_for_timeout(&self, ms: u64) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("wait {}", ms))
    }

    async fn title(&self) -> Result<String, PageError> {
        Ok(self.state.lock().unwrap().title.clone())
    }

    async fn url(&self) -> Result<String, PageError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn content(&self) -> Result<String, PageError> {
        Ok(self.state.lock().unwrap().html.clone())
    }

    async fn is_visible(&self, target: &Target) -> Result<bool, PageError> {
        Ok(self.with_element(target, |e| !e.hidden).unwrap_or(false))
    }

    async fn text_content(&self, target: &Target) -> Result<Option<String>, PageError> {
        self.with_element(target, |e| Some(e.text.clone()))
    }

    async fn input_value(&self, target: &Target) -> Result<String, PageError> {
        self.with_element(target, |e| e.value.clone())
    }

    async fn get_attribute(&self, target: &Target, name: &str) -> Result<Option<String>, PageError> {
        self.with_element(target, |e| e.attributes.get(name).cloned())
    }

    async fn computed_style(&self, target: &Target, property: &str) -> Result<String, PageError> {
        self.with_element(target, |e| e.styles.get(property).cloned().unwrap_or_default())
    }

    async fn evaluate(&self, _script: &str, arg: Value) -> Result<Value, PageError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("evaluate {}", arg))?;
        Ok(state.evaluate_result.clone())
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("mouse.move {} {}", x, y))
    }

    async fn mouse_down(&self) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "mouse.down".to_string())
    }

    async fn mouse_up(&self) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "mouse.up".to_string())
    }

    async fn mouse_click(&self, x: f64, y: f64, click_count: u32) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("mouse.click {} {} x{}", x, y, click_count))
    }

    async fn keyboard_press(&self, key: &str) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("keyboard.press {}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SelectorStrategy;
    use crate::selector::resolve;

    #[tokio::test]
    async fn test_fake_page_resolves_nth_and_counts() {
        let page = FakePage::new()
            .with(FakeElement::new("li").text("a"))
            .with(FakeElement::new("li").text("b"));
        let target = resolve("li", &SelectorStrategy::Css).unwrap();

        assert_eq!(page.count(&target).await.unwrap(), 2);
        assert_eq!(
            page.text_content(&target.element(1)).await.unwrap(),
            Some("b".to_string())
        );
        assert_eq!(page.count(&target.element(5)).await.unwrap(), 0);
        assert!(matches!(
            page.click(&target.element(5), None).await,
            Err(PageError::NotFound(_))
        ));
    }
}
