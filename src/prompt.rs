use crate::models::PendingRequest;

pub const ANSWER_MARKER: &str = "ANSWER_";

const DEFAULT_TEMPLATE: &str = r#"You are a document-based question-answering assistant. You must ONLY answer questions based on the provided context from the knowledge base.

STRICT RULES:
1. If the context below does not contain information to answer the question, you MUST respond with: "I don't have information about this topic in my knowledge base. Please ensure you've ingested relevant documents first."
2. Do NOT use your general knowledge, training data, or any information not explicitly provided in the context below
3. Only reference information that is clearly stated in the provided context
4. If the context is empty or too short, say you don't have enough information
5. Be precise and only use facts directly from the context

Context from Knowledge Base:
{context}

Question: {question}

Answer (based ONLY on the above context):"#;

// Template with {context} and {question} placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    // Single pass: placeholders inside the substituted values stay literal
    pub fn format(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

// One prompt for the whole batch -> answers come back as ANSWER_<n>:
pub fn build_batch_prompt(items: &[&PendingRequest]) -> String {
    let mut prompt = String::from(
        r#"You are a strict document-based question answering assistant. You must ONLY answer questions based on the provided context documents.

IMPORTANT RULES:
1. If the context doesn't contain information to answer a question, respond with "I don't have enough information in the provided documents to answer this question."
2. Do not use your general knowledge or training data
3. Only use information explicitly stated in the context provided for each question
4. Be precise and cite specific information from the context

Format your response as follows:
ANSWER_1: [your answer to question 1 based only on context 1]
ANSWER_2: [your answer to question 2 based only on context 2]
...and so on.

Here are the questions and their contexts:

"#,
    );

    for (i, item) in items.iter().enumerate() {
        let n = i + 1;
        prompt.push_str(&format!(
            "\nQUESTION_{n}: {}\nCONTEXT_{n}: {}\n\n",
            item.question, item.context
        ));
    }

    prompt.push_str(&format!(
        "\nRemember: Answer ONLY based on the provided contexts. If a context doesn't contain the answer, say you don't have enough information. Provide {} answers in the format specified above.",
        items.len()
    ));
    prompt
}
