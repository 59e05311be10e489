// src/prompt/examples.rs
// Worked replies shown to the model; each one decodes with the protocol codec

fn with_thought(native_thought: bool, thought: &str, body: &str) -> String {
    if native_thought {
        body.to_string()
    } else {
        format!("+++ thought +++\n{}\n{}", thought, body)
    }
}

pub fn simple_message(native_thought: bool) -> String {
    with_thought(
        native_thought,
        "The user is asking for ... so I will send them a message",
        "+++ kind +++\nmessage\n+++ message +++\nYour real message here\n+++ end +++",
    )
}

pub fn question_with_choices(native_thought: bool) -> String {
    with_thought(
        native_thought,
        "Maybe the user wants to send an email. I will ask them",
        "+++ kind +++\nmessage\n+++ message +++\nDo you want me to send an email?\n+++ data +++\nchoices:\n  - Yes\n  - No\n+++ end +++",
    )
}

pub fn tool_call(native_thought: bool) -> String {
    with_thought(
        native_thought,
        "The user wants to know the max credit they can have. Their username is john and age is 30.\n\
         There is a tool get_user_max_credit. I will use this tool to get the max credit.",
        "+++ kind +++\ntool_call\n+++ tool_name +++\nget_user_max_credit\n+++ tool_arguments +++\n\
         ~~~ username ~~~\njohn\n\n~~~ age ~~~\n30\n\n+++ end +++",
    )
}

pub fn final_answer(native_thought: bool) -> String {
    with_thought(
        native_thought,
        "I have everything I need, so I will give the final answer",
        "+++ kind +++\nfinal_answer\n+++ message +++\nYour answer here\n+++ end +++",
    )
}
